//! Event gate and dispatcher.
//!
//! One [`ResourceHandler`] exists per source cluster. The watcher delivers
//! add/update/delete events for traffic-routing resources; the handler
//! admits or filters each event, classifies the resource, and dispatches it
//! down exactly one branch:
//!
//! 1. Custom-owned resources go to the custom-resource processor.
//! 2. Multi-host resources are rejected (logged, never an error).
//! 3. Canary-owned resources re-trigger their rollout and stop.
//! 4. Resources with no governed hostname stop.
//! 5. Everything else fans out: to the hostname's dependent and source
//!    clusters when the dependency graph knows any, otherwise to the whole
//!    fleet, mirrored to the state registry when this cluster is a syncer.
//!
//! Fan-out failures are logged and swallowed; replication is idempotent and
//! the next resync converges whatever failed.

use crate::cluster::{StateRegistryMirror, WorkloadHooks};
use crate::config::{ReplicatorConfig, RESOURCE_KIND};
use crate::error::{ReplicationError, Result};
use crate::metrics::{self, OpTimer};
use crate::registry::FleetRegistry;
use crate::resource::{replication_name, EventKind, TrafficRoutingResource};
use crate::{canary, fanout, processor};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Annotation key marking who created a resource. Replicated copies are
/// stamped with it, and custom-owned resources are recognized by it.
pub const CREATED_BY_ANNOTATION: &str = "app.kubernetes.io/created-by";

const SKIP_IGNORE_ANNOTATION: &str = "ignore annotation set";

/// Per-source-cluster event handler.
pub struct ResourceHandler {
    registry: Arc<FleetRegistry>,
    config: Arc<ReplicatorConfig>,
    cluster_id: String,
    hooks: Arc<dyn WorkloadHooks>,
    state_mirror: Option<Arc<dyn StateRegistryMirror>>,
    /// Flipped by the lease manager on leadership changes. When set, every
    /// event is acknowledged without any write.
    read_only: Arc<AtomicBool>,
}

impl std::fmt::Debug for ResourceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandler")
            .field("cluster_id", &self.cluster_id)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl ResourceHandler {
    pub fn new(
        registry: Arc<FleetRegistry>,
        config: Arc<ReplicatorConfig>,
        cluster_id: impl Into<String>,
        hooks: Arc<dyn WorkloadHooks>,
        read_only: Arc<AtomicBool>,
    ) -> Result<Self> {
        let cluster_id = cluster_id.into();
        if cluster_id.is_empty() {
            return Err(ReplicationError::Precondition(
                "expected valid value for cluster id, got empty".to_string(),
            ));
        }
        Ok(Self {
            registry,
            config,
            cluster_id,
            hooks,
            state_mirror: None,
            read_only,
        })
    }

    pub fn with_state_mirror(mut self, mirror: Arc<dyn StateRegistryMirror>) -> Self {
        self.state_mirror = Some(mirror);
        self
    }

    pub async fn added(&self, resource: TrafficRoutingResource) -> Result<()> {
        self.handle_event(EventKind::Add, resource).await
    }

    pub async fn updated(&self, resource: TrafficRoutingResource) -> Result<()> {
        self.handle_event(EventKind::Update, resource).await
    }

    pub async fn deleted(&self, resource: TrafficRoutingResource) -> Result<()> {
        self.handle_event(EventKind::Delete, resource).await
    }

    async fn handle_event(&self, event: EventKind, resource: TrafficRoutingResource) -> Result<()> {
        let _timer = OpTimer::new(
            format!("handle_event={event}"),
            &self.cluster_id,
            &resource.name,
        );
        // Read-only acknowledgment comes before any other check, even the
        // config precondition: a standby process must stay a silent no-op.
        if self.read_only.load(Ordering::Relaxed) {
            if event == EventKind::Delete {
                info!(
                    cluster = %self.cluster_id,
                    name = %resource.name,
                    namespace = %resource.namespace,
                    "read-only mode, skipping delete"
                );
            }
            metrics::record_event(event.as_str(), "read_only");
            return Ok(());
        }
        self.config.validate()?;

        // Custom-owned resources bypass the admission filter entirely; they
        // live outside the replication pipeline. Their processing outcome is
        // logged but never escalated to the watcher.
        if self.is_custom_owned(&resource) {
            metrics::record_event(event.as_str(), "custom_owned");
            if let Err(e) = processor::process_custom_resource(
                &self.registry,
                &self.config,
                &self.cluster_id,
                &resource,
                self.hooks.as_ref(),
            )
            .await
            {
                warn!(
                    cluster = %self.cluster_id,
                    name = %resource.name,
                    error = %e,
                    "custom resource processing failed"
                );
            }
            return Ok(());
        }

        if let Some(reason) = self.admission_skip_reason(&resource) {
            if reason == SKIP_IGNORE_ANNOTATION {
                debug!(
                    cluster = %self.cluster_id,
                    name = %resource.name,
                    namespace = %resource.namespace,
                    "ignore annotation is set"
                );
            }
            // Deletes of filtered resources are logged with their cause so
            // operators can trace why no cleanup ran.
            if event == EventKind::Delete {
                info!(
                    cluster = %self.cluster_id,
                    name = %resource.name,
                    namespace = %resource.namespace,
                    reason,
                    "skipping delete of filtered resource"
                );
            }
            metrics::record_event(event.as_str(), "filtered");
            return Ok(());
        }

        if resource.spec.hosts.len() > 1 {
            info!(
                cluster = %self.cluster_id,
                name = %resource.name,
                hosts = ?resource.spec.hosts,
                "skipping resource with multiple hosts, not supported for replication"
            );
            metrics::record_event(event.as_str(), "multi_host");
            return Ok(());
        }

        if self.config.canary_resolution_enabled {
            let owned = canary::resolve_and_trigger(
                &self.registry,
                &self.cluster_id,
                &resource,
                self.hooks.as_ref(),
            )
            .await?;
            if owned {
                metrics::record_event(event.as_str(), "canary_owned");
                return Ok(());
            }
        }

        let Some(host) = resource.governed_host().map(str::to_string) else {
            info!(
                cluster = %self.cluster_id,
                name = %resource.name,
                "skipping resource with no governed hostname"
            );
            metrics::record_event(event.as_str(), "no_host");
            return Ok(());
        };

        let derived_name = replication_name(&resource.namespace, &resource.name);
        let deps = self.registry.dependency_cache();
        let dependents = deps.dependent_clusters(&host);

        let result = if !dependents.is_empty() {
            // Dependents first, then sources, each cluster exactly once.
            let mut targets = dependents;
            let mut seen: BTreeSet<String> = targets.iter().cloned().collect();
            for source in deps.source_clusters(&host) {
                if seen.insert(source.clone()) {
                    targets.push(source);
                }
            }
            info!(
                cluster = %self.cluster_id,
                name = %resource.name,
                host = %host,
                targets = ?targets,
                event = %event,
                "replicating to dependent and source clusters"
            );
            fanout::sync_to_clusters(
                self.registry.clone(),
                self.config.clone(),
                targets,
                &resource,
                event,
                &derived_name,
            )
            .await
        } else {
            let targets = self.registry.list_cluster_ids();
            info!(
                cluster = %self.cluster_id,
                name = %resource.name,
                host = %host,
                targets = ?targets,
                event = %event,
                "no dependent clusters known, replicating to the whole fleet"
            );
            let result = fanout::sync_to_clusters(
                self.registry.clone(),
                self.config.clone(),
                targets,
                &resource,
                event,
                &derived_name,
            )
            .await;
            if result.is_ok() {
                self.mirror_event(event, &resource, &derived_name).await;
            }
            result
        };

        match result {
            Ok(()) => {
                info!(
                    cluster = %self.cluster_id,
                    name = %resource.name,
                    event = %event,
                    "synced to all target clusters"
                );
                metrics::record_event(event.as_str(), "synced");
                Ok(())
            }
            Err(e) => {
                // Partial failures converge on the next resync, so the
                // fan-out result is not retried in process.
                warn!(
                    cluster = %self.cluster_id,
                    name = %resource.name,
                    event = %event,
                    error = %e,
                    "fan-out failed, will not be retried"
                );
                metrics::record_event(event.as_str(), "failed");
                Ok(())
            }
        }
    }

    fn is_custom_owned(&self, resource: &TrafficRoutingResource) -> bool {
        match &self.config.custom_owned_created_by {
            Some(marker) => resource.annotation(CREATED_BY_ANNOTATION) == Some(marker.as_str()),
            None => false,
        }
    }

    /// Admission filter. Returns the skip cause, or `None` to admit.
    fn admission_skip_reason(&self, resource: &TrafficRoutingResource) -> Option<&'static str> {
        if resource.annotation(&self.config.ignore_annotation) == Some("true") {
            return Some(SKIP_IGNORE_ANNOTATION);
        }
        if resource.namespace == self.config.sync_namespace {
            return Some("resource lives in the sync namespace");
        }
        if self
            .config
            .ignored_namespaces
            .iter()
            .any(|ns| ns == &resource.namespace)
        {
            return Some("namespace is ignored");
        }
        if resource.spec.export_to.len() == 1 && resource.spec.export_to[0] == "." {
            return Some("exported to its own namespace only");
        }
        None
    }

    /// Best-effort mirror of the event into the state registry, keyed by the
    /// derived replication name. Only fires when this cluster holds the
    /// syncer role; errors are logged.
    async fn mirror_event(
        &self,
        event: EventKind,
        resource: &TrafficRoutingResource,
        derived_name: &str,
    ) {
        if !self.config.is_syncer_cluster(&self.cluster_id) {
            return;
        }
        let Some(mirror) = &self.state_mirror else {
            return;
        };
        let tx_id = Uuid::new_v4().to_string();
        let result = match event {
            EventKind::Add | EventKind::Update => {
                mirror
                    .put_custom_data(
                        &self.cluster_id,
                        &resource.namespace,
                        derived_name,
                        RESOURCE_KIND,
                        &tx_id,
                        resource,
                    )
                    .await
            }
            EventKind::Delete => {
                mirror
                    .delete_custom_data(
                        &self.cluster_id,
                        &resource.namespace,
                        derived_name,
                        RESOURCE_KIND,
                        &tx_id,
                    )
                    .await
            }
        };
        match result {
            Ok(()) => {
                metrics::record_state_mirror(&self.cluster_id, event.as_str(), true);
                debug!(
                    cluster = %self.cluster_id,
                    name = derived_name,
                    tx_id = %tx_id,
                    event = %event,
                    "mirrored event to state registry"
                );
            }
            Err(e) => {
                metrics::record_state_mirror(&self.cluster_id, event.as_str(), false);
                warn!(
                    cluster = %self.cluster_id,
                    name = derived_name,
                    tx_id = %tx_id,
                    event = %event,
                    error = %e,
                    "state registry mirror failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::BoxApiFuture;
    use crate::workload::{Deployment, Rollout};

    struct NoopHooks;

    impl WorkloadHooks for NoopHooks {
        fn rollout_updated(&self, _cluster: &str, _rollout: Rollout) -> BoxApiFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }

        fn deployment_updated(
            &self,
            _cluster: &str,
            _deployment: Deployment,
        ) -> BoxApiFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }
    }

    fn handler() -> ResourceHandler {
        ResourceHandler::new(
            Arc::new(FleetRegistry::new()),
            Arc::new(ReplicatorConfig::for_testing("mesh-sync")),
            "east-1",
            Arc::new(NoopHooks),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap()
    }

    fn resource_in(namespace: &str) -> TrafficRoutingResource {
        TrafficRoutingResource {
            name: "foo".to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_rejects_empty_cluster_id() {
        let err = ResourceHandler::new(
            Arc::new(FleetRegistry::new()),
            Arc::new(ReplicatorConfig::for_testing("mesh-sync")),
            "",
            Arc::new(NoopHooks),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap_err();
        assert!(matches!(err, ReplicationError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_read_only_acknowledges_before_config_validation() {
        // Empty sync namespace would fail validation, but a read-only
        // standby acknowledges every event without looking at the config.
        let h = ResourceHandler::new(
            Arc::new(FleetRegistry::new()),
            Arc::new(ReplicatorConfig::default()),
            "east-1",
            Arc::new(NoopHooks),
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap();
        assert!(h.config.validate().is_err());

        h.added(resource_in("app-ns")).await.unwrap();
        h.updated(resource_in("app-ns")).await.unwrap();
        h.deleted(resource_in("app-ns")).await.unwrap();
    }

    #[test]
    fn test_filter_sync_namespace() {
        let h = handler();
        assert!(h.admission_skip_reason(&resource_in("mesh-sync")).is_some());
        assert!(h.admission_skip_reason(&resource_in("app-ns")).is_none());
    }

    #[test]
    fn test_filter_ignored_namespace() {
        let h = handler();
        assert!(h.admission_skip_reason(&resource_in("kube-system")).is_some());
    }

    #[test]
    fn test_filter_ignore_annotation() {
        let h = handler();
        let mut r = resource_in("app-ns");
        r.annotations
            .insert(h.config.ignore_annotation.clone(), "true".to_string());
        assert!(h.admission_skip_reason(&r).is_some());

        r.annotations
            .insert(h.config.ignore_annotation.clone(), "false".to_string());
        assert!(h.admission_skip_reason(&r).is_none());
    }

    #[test]
    fn test_filter_local_export_scope() {
        let h = handler();
        let mut r = resource_in("app-ns");
        r.spec.export_to = vec![".".to_string()];
        assert!(h.admission_skip_reason(&r).is_some());

        r.spec.export_to = vec![".".to_string(), "other-ns".to_string()];
        assert!(h.admission_skip_reason(&r).is_none());
    }

    #[test]
    fn test_custom_owned_detection() {
        let mut config = ReplicatorConfig::for_testing("mesh-sync");
        config.custom_owned_created_by = Some("traffic-ops".to_string());
        let h = ResourceHandler::new(
            Arc::new(FleetRegistry::new()),
            Arc::new(config),
            "east-1",
            Arc::new(NoopHooks),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        let mut r = resource_in("app-ns");
        assert!(!h.is_custom_owned(&r));
        r.annotations.insert(
            CREATED_BY_ANNOTATION.to_string(),
            "traffic-ops".to_string(),
        );
        assert!(h.is_custom_owned(&r));
    }
}
