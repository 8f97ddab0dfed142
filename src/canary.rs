//! Canary ownership resolution.
//!
//! A traffic-routing resource can be owned by a progressive-delivery rollout
//! that references it as its canary routing resource. Such a resource is the
//! rollout's private traffic split, not fleet state: instead of replicating
//! it, the engine re-triggers reconciliation of every owning rollout so the
//! rollout's own pipeline recomputes downstream state.

use crate::cluster::WorkloadHooks;
use crate::error::{ReplicationError, Result};
use crate::registry::FleetRegistry;
use crate::resource::TrafficRoutingResource;
use tracing::{debug, info};

/// Decide whether `resource` is owned by a canary rollout in `cluster`, and
/// fire the rollout update hook for every owner found.
///
/// Returns `Ok(true)` when at least one rollout references the resource, in
/// which case the caller must stop replication. A listing failure is fatal:
/// ownership cannot be decided without it, so the error propagates and the
/// event is retried. Hook failures do not stop remaining owners; they are
/// collected and returned together after every owner was attempted.
pub async fn resolve_and_trigger(
    registry: &FleetRegistry,
    cluster: &str,
    resource: &TrafficRoutingResource,
    hooks: &dyn WorkloadHooks,
) -> Result<bool> {
    let handle = registry.get_cluster_handle(cluster).ok_or_else(|| {
        ReplicationError::ClusterNotReady {
            cluster: cluster.to_string(),
            reason: "cluster handle not found in fleet registry".to_string(),
        }
    })?;
    let rollouts = handle.rollouts.as_deref().ok_or_else(|| {
        ReplicationError::ClusterNotReady {
            cluster: cluster.to_string(),
            reason: "rollout client not initialized".to_string(),
        }
    })?;

    let listed = rollouts
        .list(&resource.namespace)
        .await
        .map_err(|source| ReplicationError::RolloutLookup {
            namespace: resource.namespace.clone(),
            source,
        })?;

    let mut owned = false;
    let mut errors = Vec::new();
    for rollout in listed {
        if !rollout.references_routing_resource(&resource.name) {
            continue;
        }
        owned = true;
        info!(
            cluster,
            name = %resource.name,
            rollout = %rollout.name,
            "owned by canary rollout, re-triggering rollout reconciliation"
        );
        let rollout_name = rollout.name.clone();
        if let Err(e) = hooks.rollout_updated(cluster, rollout).await {
            errors.push(ReplicationError::cluster(
                cluster,
                "rollout_updated",
                rollout_name,
                e,
            ));
        }
    }

    if !owned {
        debug!(cluster, name = %resource.name, "no canary rollout references this resource");
    }

    ReplicationError::aggregate(errors)?;
    Ok(owned)
}
