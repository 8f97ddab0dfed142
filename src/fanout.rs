//! Concurrent fan-out of one event to many target clusters.
//!
//! Each target cluster gets its own task and its own deep copy of the
//! resource; nothing is shared between workers except the read-only registry
//! and config. All tasks are joined before returning, and every per-cluster
//! failure is collected into a single [`ReplicationError::Aggregate`] so a
//! dead or slow cluster can never hide another cluster's failure.

use crate::config::ReplicatorConfig;
use crate::error::{ReplicationError, Result};
use crate::reconciler;
use crate::registry::FleetRegistry;
use crate::resource::{EventKind, TrafficRoutingResource};
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Replicate one resource to every cluster in `clusters`, concurrently.
///
/// Returns `Ok(())` only when every target cluster succeeded. Partial
/// failures come back as one aggregate error; the clusters that succeeded
/// stay synced, and the failed ones converge on the next resync.
pub async fn sync_to_clusters(
    registry: Arc<FleetRegistry>,
    config: Arc<ReplicatorConfig>,
    clusters: Vec<String>,
    resource: &TrafficRoutingResource,
    event: EventKind,
    derived_name: &str,
) -> Result<()> {
    if derived_name.is_empty() {
        return Err(ReplicationError::Precondition(
            "expected a derived replication name, got empty".to_string(),
        ));
    }
    if clusters.is_empty() {
        debug!(name = derived_name, event = %event, "no target clusters, nothing to sync");
        return Ok(());
    }

    let mut tasks = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        let registry = registry.clone();
        let config = config.clone();
        // Independent copy per worker: rewriting mutates routes in place.
        let copy = resource.clone();
        let name = derived_name.to_string();
        tasks.push(tokio::spawn(async move {
            reconciler::sync_to_cluster(&registry, &config, &cluster, copy, event, &name).await
        }));
    }

    let mut errors = Vec::new();
    for joined in join_all(tasks).await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => errors.push(e),
            Err(join_err) => errors.push(ReplicationError::Internal(format!(
                "sync task panicked: {join_err}"
            ))),
        }
    }
    ReplicationError::aggregate(errors)
}
