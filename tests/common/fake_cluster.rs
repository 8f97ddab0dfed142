//! In-memory fakes for the per-cluster capability traits.
//!
//! Every fake records the calls made against it so tests can assert on the
//! exact sequence of API operations, and supports failure injection for the
//! error paths (unreachable clusters, version conflicts, create races).

use fleet_replicator::cluster::{
    ApiError, BoxApiFuture, DeploymentApi, RolloutApi, StateRegistryMirror, TrafficRoutingApi,
    WorkloadHooks,
};
use fleet_replicator::resource::TrafficRoutingResource;
use fleet_replicator::workload::{Deployment, Rollout};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory traffic-routing store with optimistic-concurrency semantics.
#[derive(Default)]
pub struct FakeTrafficApi {
    store: Mutex<HashMap<(String, String), TrafficRoutingResource>>,
    calls: Mutex<Vec<String>>,
    version_counter: AtomicU64,
    unreachable: AtomicBool,
    /// Number of upcoming updates that fail with `Conflict` regardless of
    /// the resource version carried.
    forced_conflicts: AtomicUsize,
    /// Number of upcoming gets that fail with a generic API error.
    forced_get_failures: AtomicUsize,
}

impl FakeTrafficApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a resource into the store directly, bypassing call recording.
    pub fn seed(&self, mut resource: TrafficRoutingResource) {
        resource.resource_version = self.next_version();
        self.store.lock().unwrap().insert(
            (resource.namespace.clone(), resource.name.clone()),
            resource,
        );
    }

    pub fn stored(&self, namespace: &str, name: &str) -> Option<TrafficRoutingResource> {
        self.store
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn stored_names(&self, namespace: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .lock()
            .unwrap()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn inject_conflicts(&self, count: usize) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }

    pub fn inject_get_failures(&self, count: usize) {
        self.forced_get_failures.store(count, Ordering::SeqCst);
    }

    fn next_version(&self) -> String {
        (self.version_counter.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_reachable(&self) -> Result<(), ApiError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(ApiError::unreachable(
                "lookup fake-cluster.mesh.internal: no such host",
            ))
        } else {
            Ok(())
        }
    }

    fn consume(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl TrafficRoutingApi for FakeTrafficApi {
    fn get(&self, namespace: &str, name: &str) -> BoxApiFuture<'_, TrafficRoutingResource> {
        self.record(format!("get {namespace}/{name}"));
        let result = self.check_reachable().and_then(|_| {
            if Self::consume(&self.forced_get_failures) {
                return Err(ApiError::api("injected get failure"));
            }
            self.stored(namespace, name).ok_or(ApiError::NotFound)
        });
        Box::pin(async move { result })
    }

    fn create(&self, resource: TrafficRoutingResource) -> BoxApiFuture<'_, TrafficRoutingResource> {
        self.record(format!("create {}/{}", resource.namespace, resource.name));
        let result = self.check_reachable().and_then(|_| {
            let key = (resource.namespace.clone(), resource.name.clone());
            let mut store = self.store.lock().unwrap();
            if store.contains_key(&key) {
                return Err(ApiError::AlreadyExists);
            }
            let mut created = resource;
            created.resource_version = self.next_version();
            store.insert(key, created.clone());
            Ok(created)
        });
        Box::pin(async move { result })
    }

    fn update(&self, resource: TrafficRoutingResource) -> BoxApiFuture<'_, TrafficRoutingResource> {
        self.record(format!("update {}/{}", resource.namespace, resource.name));
        let result = self.check_reachable().and_then(|_| {
            if Self::consume(&self.forced_conflicts) {
                return Err(ApiError::Conflict);
            }
            let key = (resource.namespace.clone(), resource.name.clone());
            let mut store = self.store.lock().unwrap();
            let current = store.get(&key).ok_or(ApiError::NotFound)?;
            if current.resource_version != resource.resource_version {
                return Err(ApiError::Conflict);
            }
            let mut updated = resource;
            updated.resource_version = self.next_version();
            store.insert(key, updated.clone());
            Ok(updated)
        });
        Box::pin(async move { result })
    }

    fn delete(&self, namespace: &str, name: &str) -> BoxApiFuture<'_, ()> {
        self.record(format!("delete {namespace}/{name}"));
        let result = self.check_reachable().and_then(|_| {
            let key = (namespace.to_string(), name.to_string());
            if self.store.lock().unwrap().remove(&key).is_some() {
                Ok(())
            } else {
                Err(ApiError::NotFound)
            }
        });
        Box::pin(async move { result })
    }
}

/// Rollout listing and cache fake.
#[derive(Default)]
pub struct FakeRolloutApi {
    rollouts: Mutex<Vec<Rollout>>,
    cached: Mutex<HashMap<(String, String), Rollout>>,
    list_error: Mutex<Option<ApiError>>,
}

impl FakeRolloutApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rollout(&self, rollout: Rollout) {
        self.rollouts.lock().unwrap().push(rollout);
    }

    pub fn cache(&self, identity: &str, env: &str, rollout: Rollout) {
        self.cached
            .lock()
            .unwrap()
            .insert((identity.to_string(), env.to_string()), rollout);
    }

    pub fn fail_list_with(&self, error: ApiError) {
        *self.list_error.lock().unwrap() = Some(error);
    }
}

impl RolloutApi for FakeRolloutApi {
    fn list(&self, namespace: &str) -> BoxApiFuture<'_, Vec<Rollout>> {
        let result = match self.list_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(self
                .rollouts
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.namespace == namespace)
                .cloned()
                .collect()),
        };
        Box::pin(async move { result })
    }

    fn get_cached(&self, identity: &str, env: &str) -> Option<Rollout> {
        self.cached
            .lock()
            .unwrap()
            .get(&(identity.to_string(), env.to_string()))
            .cloned()
    }
}

/// Deployment cache fake.
#[derive(Default)]
pub struct FakeDeploymentApi {
    cached: Mutex<HashMap<(String, String), Deployment>>,
}

impl FakeDeploymentApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self, identity: &str, env: &str, deployment: Deployment) {
        self.cached
            .lock()
            .unwrap()
            .insert((identity.to_string(), env.to_string()), deployment);
    }
}

impl DeploymentApi for FakeDeploymentApi {
    fn get_cached(&self, identity: &str, env: &str) -> Option<Deployment> {
        self.cached
            .lock()
            .unwrap()
            .get(&(identity.to_string(), env.to_string()))
            .cloned()
    }
}

/// Recording workload hook fake.
#[derive(Default)]
pub struct FakeHooks {
    rollout_updates: Mutex<Vec<(String, String)>>,
    deployment_updates: Mutex<Vec<(String, String)>>,
    fail_rollout_updates: AtomicBool,
}

impl FakeHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rollout_updates(&self) -> Vec<(String, String)> {
        self.rollout_updates.lock().unwrap().clone()
    }

    pub fn deployment_updates(&self) -> Vec<(String, String)> {
        self.deployment_updates.lock().unwrap().clone()
    }

    pub fn fail_rollout_updates(&self) {
        self.fail_rollout_updates.store(true, Ordering::SeqCst);
    }
}

impl WorkloadHooks for FakeHooks {
    fn rollout_updated(&self, cluster: &str, rollout: Rollout) -> BoxApiFuture<'_, ()> {
        self.rollout_updates
            .lock()
            .unwrap()
            .push((cluster.to_string(), rollout.name.clone()));
        let result = if self.fail_rollout_updates.load(Ordering::SeqCst) {
            Err(ApiError::api("injected rollout hook failure"))
        } else {
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn deployment_updated(&self, cluster: &str, deployment: Deployment) -> BoxApiFuture<'_, ()> {
        self.deployment_updates
            .lock()
            .unwrap()
            .push((cluster.to_string(), deployment.name.clone()));
        Box::pin(async move { Ok(()) })
    }
}

/// Recording state-registry mirror fake.
#[derive(Default)]
pub struct FakeStateRegistry {
    puts: Mutex<Vec<(String, String, String)>>,
    deletes: Mutex<Vec<(String, String, String)>>,
}

impl FakeStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(cluster, name, resource_kind)` triples from put calls.
    pub fn puts(&self) -> Vec<(String, String, String)> {
        self.puts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<(String, String, String)> {
        self.deletes.lock().unwrap().clone()
    }
}

impl StateRegistryMirror for FakeStateRegistry {
    fn put_custom_data(
        &self,
        cluster: &str,
        _namespace: &str,
        name: &str,
        resource_kind: &str,
        _transaction_id: &str,
        _resource: &TrafficRoutingResource,
    ) -> BoxApiFuture<'_, ()> {
        self.puts.lock().unwrap().push((
            cluster.to_string(),
            name.to_string(),
            resource_kind.to_string(),
        ));
        Box::pin(async move { Ok(()) })
    }

    fn delete_custom_data(
        &self,
        cluster: &str,
        _namespace: &str,
        name: &str,
        resource_kind: &str,
        _transaction_id: &str,
    ) -> BoxApiFuture<'_, ()> {
        self.deletes.lock().unwrap().push((
            cluster.to_string(),
            name.to_string(),
            resource_kind.to_string(),
        ));
        Box::pin(async move { Ok(()) })
    }
}
