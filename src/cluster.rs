//! Per-cluster capability traits.
//!
//! Defines the interfaces the engine needs from each cluster: a CRUD client
//! for the traffic-routing resource type, cached rollout/deployment lookups,
//! workload update hooks, and the optional state-registry mirror. The
//! control-plane daemon provides implementations backed by real API clients;
//! tests substitute in-memory fakes.
//!
//! # Example
//!
//! ```rust,no_run
//! use fleet_replicator::cluster::{ApiError, ApiResult, BoxApiFuture, TrafficRoutingApi};
//! use fleet_replicator::resource::TrafficRoutingResource;
//!
//! struct MyClient { /* ... */ }
//!
//! impl TrafficRoutingApi for MyClient {
//!     fn get(&self, _namespace: &str, _name: &str) -> BoxApiFuture<'_, TrafficRoutingResource> {
//!         Box::pin(async move { Err(ApiError::NotFound) })
//!     }
//!
//!     fn create(&self, resource: TrafficRoutingResource) -> BoxApiFuture<'_, TrafficRoutingResource> {
//!         Box::pin(async move { Ok(resource) })
//!     }
//!
//!     fn update(&self, resource: TrafficRoutingResource) -> BoxApiFuture<'_, TrafficRoutingResource> {
//!         Box::pin(async move { Ok(resource) })
//!     }
//!
//!     fn delete(&self, _namespace: &str, _name: &str) -> BoxApiFuture<'_, ()> {
//!         Box::pin(async move { Ok(()) })
//!     }
//! }
//! ```

use crate::resource::TrafficRoutingResource;
use crate::workload::{Deployment, Rollout};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Result type for per-cluster API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Type alias for boxed async futures returned by the client traits.
pub type BoxApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// Typed error surface of a per-cluster API client.
///
/// Client implementations classify their transport errors into these
/// variants so the engine never inspects error text. In particular
/// [`ApiError::ClusterUnreachable`] replaces the historical practice of
/// regex-matching "no such host" messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The object does not exist. Expected on first create and on repeated
    /// deletes; treated as "create" or "already gone", never as a failure.
    #[error("not found")]
    NotFound,

    /// Create raced with another writer that got there first.
    #[error("already exists")]
    AlreadyExists,

    /// Optimistic-concurrency version check failed on update.
    #[error("resource version conflict")]
    Conflict,

    /// The cluster endpoint cannot be reached at the network level
    /// (DNS resolution failure, connection refused on a dead endpoint).
    /// Downgraded to a warning wherever it occurs.
    #[error("cluster unreachable: {message}")]
    ClusterUnreachable { message: String },

    /// Any other API failure.
    #[error("api error: {message}")]
    Api { message: String },
}

impl ApiError {
    /// Build an unreachable-cluster error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::ClusterUnreachable {
            message: message.into(),
        }
    }

    /// Build a generic API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// True when the error means the target cluster is dead (unreachable at
    /// the network level). Dead clusters are logged as warnings and skipped
    /// so one bad endpoint never destabilizes fan-out to the healthy fleet.
    pub fn is_dead_cluster(&self) -> bool {
        matches!(self, Self::ClusterUnreachable { .. })
    }

    /// True when the error is the expected absence of an object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// True when an update lost an optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// CRUD client for the traffic-routing resource type in one cluster.
///
/// All operations address objects by `(namespace, name)`. Create and update
/// return the server's view of the written object (with its new resource
/// version).
pub trait TrafficRoutingApi: Send + Sync {
    fn get(&self, namespace: &str, name: &str) -> BoxApiFuture<'_, TrafficRoutingResource>;
    fn create(&self, resource: TrafficRoutingResource) -> BoxApiFuture<'_, TrafficRoutingResource>;
    fn update(&self, resource: TrafficRoutingResource) -> BoxApiFuture<'_, TrafficRoutingResource>;
    fn delete(&self, namespace: &str, name: &str) -> BoxApiFuture<'_, ()>;
}

/// Rollout listing and cached lookup for one cluster.
pub trait RolloutApi: Send + Sync {
    /// List all rollouts in a namespace (live API call).
    fn list(&self, namespace: &str) -> BoxApiFuture<'_, Vec<Rollout>>;

    /// Cached lookup by `(workload identity, environment)` key.
    /// Returns `None` on a cache miss; never an error.
    fn get_cached(&self, identity: &str, env: &str) -> Option<Rollout>;
}

/// Cached deployment lookup for one cluster.
pub trait DeploymentApi: Send + Sync {
    /// Cached lookup by `(workload identity, environment)` key.
    fn get_cached(&self, identity: &str, env: &str) -> Option<Deployment>;
}

/// Update hooks the engine fires to re-trigger downstream reconciliation
/// for a workload. Implemented by the surrounding control plane.
pub trait WorkloadHooks: Send + Sync {
    fn rollout_updated(&self, cluster: &str, rollout: Rollout) -> BoxApiFuture<'_, ()>;
    fn deployment_updated(&self, cluster: &str, deployment: Deployment) -> BoxApiFuture<'_, ()>;
}

/// Optional mirror of replication events into an external state registry.
///
/// Only consulted when the fleet runs in a state-sync role. Both calls are
/// best effort; the engine logs and swallows their errors.
pub trait StateRegistryMirror: Send + Sync {
    fn put_custom_data(
        &self,
        cluster: &str,
        namespace: &str,
        name: &str,
        resource_kind: &str,
        transaction_id: &str,
        resource: &TrafficRoutingResource,
    ) -> BoxApiFuture<'_, ()>;

    fn delete_custom_data(
        &self,
        cluster: &str,
        namespace: &str,
        name: &str,
        resource_kind: &str,
        transaction_id: &str,
    ) -> BoxApiFuture<'_, ()>;
}

/// Per-cluster capability bundle.
///
/// One handle per cluster, shared read-only by every task operating on that
/// cluster. The rollout and deployment clients are optional: not every
/// cluster runs progressive delivery.
#[derive(Clone)]
pub struct ClusterHandle {
    pub cluster_id: String,
    pub traffic_routing: Option<Arc<dyn TrafficRoutingApi>>,
    pub rollouts: Option<Arc<dyn RolloutApi>>,
    pub deployments: Option<Arc<dyn DeploymentApi>>,
}

impl ClusterHandle {
    /// Create a handle with no sub-clients attached.
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            traffic_routing: None,
            rollouts: None,
            deployments: None,
        }
    }

    pub fn with_traffic_routing(mut self, client: Arc<dyn TrafficRoutingApi>) -> Self {
        self.traffic_routing = Some(client);
        self
    }

    pub fn with_rollouts(mut self, client: Arc<dyn RolloutApi>) -> Self {
        self.rollouts = Some(client);
        self
    }

    pub fn with_deployments(mut self, client: Arc<dyn DeploymentApi>) -> Self {
        self.deployments = Some(client);
        self
    }
}

impl std::fmt::Debug for ClusterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterHandle")
            .field("cluster_id", &self.cluster_id)
            .field("traffic_routing", &self.traffic_routing.is_some())
            .field("rollouts", &self.rollouts.is_some())
            .field("deployments", &self.deployments.is_some())
            .finish()
    }
}
