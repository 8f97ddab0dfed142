//! Per-cluster reconciliation.
//!
//! One call to [`sync_to_cluster`] makes a single target cluster converge on
//! the desired state for one replicated resource. Every path is idempotent:
//! replaying the same event against a cluster that already holds the correct
//! copy changes nothing and returns no error.
//!
//! # Delete protocol
//!
//! Deletes run best-effort cleanup under the source's original name first,
//! then delete by derived name. Not-found on the derived name falls back to
//! the all-lowercase derived name (legacy copies were created lowercased)
//! before concluding [`DeleteOutcome::AlreadyGone`].
//!
//! # Create/update protocol
//!
//! The working copy is renamed to the derived name, its route destinations
//! pointing at the internal local domain are rewritten to the governed
//! hostname, and the result is created or updated in the sync namespace.
//! Update races are resolved by the conflict retry engine: re-fetch the
//! server's copy, overwrite spec/labels/annotations, update again, up to
//! [`MAX_CONFLICT_RETRIES`] attempts. Last write wins under concurrent
//! writers; identity is never fabricated.

use crate::cluster::{ApiError, ApiResult, TrafficRoutingApi};
use crate::config::ReplicatorConfig;
use crate::error::{ReplicationError, Result};
use crate::metrics::{self, OpTimer};
use crate::registry::{DependencyCache, FleetRegistry};
use crate::resource::{EventKind, TrafficRoutingResource};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Attempt cap for the conflict retry engine.
pub const MAX_CONFLICT_RETRIES: usize = 5;

/// Outcome of the delete protocol.
///
/// `AlreadyGone` is reported distinctly so callers can tell idempotent
/// completion apart from a real failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// A copy existed and was deleted.
    Deleted,
    /// Either the copy was already deleted, or it never existed.
    AlreadyGone,
}

/// Synchronize one resource copy to one target cluster.
///
/// The caller hands over an independent copy; routes are mutated in place
/// during rewriting, so copies must never be shared between workers.
pub async fn sync_to_cluster(
    registry: &FleetRegistry,
    config: &ReplicatorConfig,
    cluster: &str,
    resource: TrafficRoutingResource,
    event: EventKind,
    derived_name: &str,
) -> Result<()> {
    let tx_id = Uuid::new_v4().to_string();
    let _timer = OpTimer::new(format!("sync_to_cluster={event}"), cluster, derived_name);

    let handle = registry.get_cluster_handle(cluster).ok_or_else(|| {
        ReplicationError::ClusterNotReady {
            cluster: cluster.to_string(),
            reason: "cluster handle not found in fleet registry".to_string(),
        }
    })?;
    let client = handle.traffic_routing.as_deref().ok_or_else(|| {
        ReplicationError::ClusterNotReady {
            cluster: cluster.to_string(),
            reason: "traffic-routing client not initialized".to_string(),
        }
    })?;

    info!(cluster, name = derived_name, tx_id = %tx_id, event = %event, "processing");

    let result = match event {
        EventKind::Delete => {
            delete_from_cluster(client, config, cluster, &resource, derived_name, &tx_id).await
        }
        EventKind::Add | EventKind::Update => {
            apply_to_cluster(
                client,
                config,
                registry.dependency_cache(),
                cluster,
                resource,
                derived_name,
                &tx_id,
            )
            .await
        }
    };

    metrics::record_cluster_sync(cluster, event.as_str(), result.is_ok());
    result
}

async fn delete_from_cluster(
    client: &dyn TrafficRoutingApi,
    config: &ReplicatorConfig,
    cluster: &str,
    resource: &TrafficRoutingResource,
    derived_name: &str,
    tx_id: &str,
) -> Result<()> {
    // Best-effort cleanup of any stale copy keyed by the source's own name.
    if let Err(e) = client.delete(&config.sync_namespace, &resource.name).await {
        if !e.is_not_found() {
            debug!(cluster, name = %resource.name, error = %e, "old-name cleanup delete failed");
        }
    }

    match delete_replica(client, &config.sync_namespace, derived_name).await {
        Ok(DeleteOutcome::AlreadyGone) => {
            info!(
                cluster,
                name = derived_name,
                tx_id,
                "copy was already deleted, or it never existed"
            );
            Ok(())
        }
        Ok(DeleteOutcome::Deleted) => {
            info!(cluster, name = derived_name, tx_id, "deleted replicated copy");
            Ok(())
        }
        Err(e) if e.is_dead_cluster() => {
            warn!(cluster, name = derived_name, tx_id, error = %e, "dead cluster, skipping delete");
            metrics::record_dead_cluster_skip(cluster, "delete");
            Ok(())
        }
        Err(e) => Err(ReplicationError::cluster(cluster, "delete", derived_name, e)),
    }
}

/// Delete a replicated copy by derived name, with the legacy lowercase
/// fallback. Not-found on both names is [`DeleteOutcome::AlreadyGone`].
pub async fn delete_replica(
    client: &dyn TrafficRoutingApi,
    namespace: &str,
    name: &str,
) -> ApiResult<DeleteOutcome> {
    match client.delete(namespace, name).await {
        Ok(()) => Ok(DeleteOutcome::Deleted),
        Err(ApiError::NotFound) => {
            // Legacy copies were created with lowercased names.
            match client.delete(namespace, &name.to_lowercase()).await {
                Ok(()) => Ok(DeleteOutcome::Deleted),
                Err(ApiError::NotFound) => Ok(DeleteOutcome::AlreadyGone),
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

async fn apply_to_cluster(
    client: &dyn TrafficRoutingApi,
    config: &ReplicatorConfig,
    deps: &DependencyCache,
    cluster: &str,
    mut resource: TrafficRoutingResource,
    derived_name: &str,
    tx_id: &str,
) -> Result<()> {
    let old_name = resource.name.clone();
    // Every replicated copy uses the derived name, never the source's own.
    resource.name = derived_name.to_string();

    let existing = match client.get(&config.sync_namespace, derived_name).await {
        Ok(current) => Some(current),
        Err(ApiError::NotFound) => {
            info!(cluster, name = derived_name, tx_id, "copy does not exist yet");
            None
        }
        Err(e) if e.is_dead_cluster() => {
            warn!(cluster, name = derived_name, tx_id, error = %e, "dead cluster, skipping sync");
            metrics::record_dead_cluster_skip(cluster, "get");
            return Ok(());
        }
        Err(e) => return Err(ReplicationError::cluster(cluster, "get", derived_name, e)),
    };

    rewrite_local_destinations(&mut resource, &config.local_domain_suffix);

    let result =
        create_or_update(client, config, deps, cluster, resource, existing, tx_id).await;

    // Best-effort cleanup of any stale copy under the pre-rename name.
    if let Err(e) = client.delete(&config.sync_namespace, &old_name).await {
        if !e.is_not_found() {
            debug!(cluster, name = %old_name, error = %e, "old-name cleanup delete failed");
        }
    }

    result
}

/// Rewrite route destinations that point at the mesh's internal local
/// domain to the resource's governed hostname.
///
/// An in-cluster short name resolves only inside its source cluster; the
/// governed hostname resolves everywhere. Destinations already pointing
/// externally are untouched.
pub fn rewrite_local_destinations(resource: &mut TrafficRoutingResource, local_suffix: &str) {
    let Some(host) = resource.spec.hosts.first().cloned() else {
        return;
    };
    for route in &mut resource.spec.http {
        for destination in &mut route.route {
            if destination.host.ends_with(local_suffix) {
                destination.host = host.clone();
            }
        }
    }
    for route in &mut resource.spec.tls {
        for destination in &mut route.route {
            if destination.host.ends_with(local_suffix) {
                destination.host = host.clone();
            }
        }
    }
}

async fn create_or_update(
    client: &dyn TrafficRoutingApi,
    config: &ReplicatorConfig,
    deps: &DependencyCache,
    cluster: &str,
    mut desired: TrafficRoutingResource,
    mut existing: Option<TrafficRoutingResource>,
    tx_id: &str,
) -> Result<()> {
    for key in &config.ignored_copy_keys {
        desired.labels.remove(key);
        desired.annotations.remove(key);
    }
    desired.annotations.insert(
        "app.kubernetes.io/created-by".to_string(),
        config.created_by.clone(),
    );

    // Cross-cluster-routing copies keep their externally managed export
    // scope; everything else gets the dependency graph's answer.
    let routing_managed = desired.label(&config.routing_marker_label) == Some("enabled");
    if !routing_managed {
        if let Some(host) = desired.spec.hosts.first() {
            desired.spec.export_to = deps.sorted_dependent_namespaces(host, cluster);
        }
    }

    if existing.is_none() {
        desired.namespace = config.sync_namespace.clone();
        desired.resource_version.clear();
        match client.create(desired.clone()).await {
            Ok(_) => {
                info!(
                    cluster,
                    name = %desired.name,
                    tx_id,
                    export_to = ?desired.spec.export_to,
                    "created replicated copy"
                );
                return Ok(());
            }
            Err(ApiError::AlreadyExists) => {
                // Race with another writer: treat as existing.
                info!(cluster, name = %desired.name, tx_id, "copy already exists, updating instead");
                match client.get(&config.sync_namespace, &desired.name).await {
                    Ok(current) => existing = Some(current),
                    Err(e) => {
                        // Update against the desired copy itself is expected
                        // to fail and be repaired by the next resync.
                        warn!(
                            cluster,
                            name = %desired.name,
                            tx_id,
                            error = %e,
                            "re-fetch after create race failed, will retry updating"
                        );
                        existing = Some(desired.clone());
                    }
                }
            }
            Err(e) => {
                error!(cluster, name = %desired.name, tx_id, error = %e, "create failed");
                return Err(ReplicationError::cluster(cluster, "create", desired.name, e));
            }
        }
    }

    if let Some(current) = existing {
        let mut updated = current;
        // Keep the server's name and resource version; replace everything
        // the source owns.
        updated.labels = desired.labels.clone();
        updated.annotations = desired.annotations.clone();
        updated.spec = desired.spec.clone();

        if let Err(e) = client.update(updated.clone()).await {
            if e.is_conflict() {
                if let Err(e) =
                    retry_update_on_conflict(client, config, cluster, &desired, &updated.name, e)
                        .await
                {
                    error!(cluster, name = %desired.name, tx_id, error = %e, "update failed");
                    return Err(ReplicationError::cluster(cluster, "update", desired.name, e));
                }
            } else {
                error!(cluster, name = %desired.name, tx_id, error = %e, "update failed");
                return Err(ReplicationError::cluster(cluster, "update", desired.name, e));
            }
        }
    }

    info!(
        cluster,
        name = %desired.name,
        tx_id,
        export_to = ?desired.spec.export_to,
        "updated replicated copy"
    );
    Ok(())
}

/// Conflict retry engine.
///
/// Runs only after an update failed with a version conflict. Each attempt
/// re-fetches the server's current copy, overwrites its spec, labels, and
/// annotations with the desired values, and updates again. A fetch failure
/// consumes the attempt and moves on. Exhaustion returns the last error.
async fn retry_update_on_conflict(
    client: &dyn TrafficRoutingApi,
    config: &ReplicatorConfig,
    cluster: &str,
    desired: &TrafficRoutingResource,
    name: &str,
    initial: ApiError,
) -> ApiResult<()> {
    let mut last_err = initial;
    for attempt in 1..=MAX_CONFLICT_RETRIES {
        warn!(
            cluster,
            name,
            attempt,
            error = %last_err,
            "update conflicted, retrying against latest version"
        );

        let mut fresh = match client.get(&config.sync_namespace, name).await {
            Ok(fresh) => fresh,
            Err(e) => {
                info!(cluster, name, attempt, error = %e, "re-fetch failed, skipping attempt");
                continue;
            }
        };

        debug!(
            cluster,
            name,
            attempt,
            resource_version = %fresh.resource_version,
            "retrying update"
        );
        fresh.labels = desired.labels.clone();
        fresh.annotations = desired.annotations.clone();
        fresh.spec = desired.spec.clone();

        match client.update(fresh).await {
            Ok(_) => {
                metrics::record_conflict_retry(cluster, true);
                return Ok(());
            }
            Err(e) => {
                metrics::record_conflict_retry(cluster, false);
                last_err = e;
            }
        }
    }
    Err(last_err)
}
