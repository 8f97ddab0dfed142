//! Custom-owned resource processing.
//!
//! Hand-authored traffic-routing resources carrying the configured
//! `created-by` marker are not replicated. They exist to feed traffic-split
//! decisions back into workload reconciliation, so the engine resolves the
//! owning workload from its caches and re-fires the workload update hooks.

use crate::cluster::WorkloadHooks;
use crate::config::ReplicatorConfig;
use crate::error::{ReplicationError, Result};
use crate::registry::FleetRegistry;
use crate::resource::TrafficRoutingResource;
use tracing::info;

/// Legacy identity normalization: some caches were populated with the first
/// character of the identity uppercased. Lookups that miss on the identity
/// as written retry with this variant.
pub fn legacy_identity_variant(identity: &str) -> String {
    let mut chars = identity.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Resolve the workload owning a custom-authored resource and re-trigger its
/// reconciliation.
///
/// The identity label and environment annotation are required; the
/// environment annotation may carry a "_"-delimited list, of which only the
/// first entry keys the cache lookup. Both the rollout and the deployment
/// hook fire when both workloads exist under the key; downstream
/// reconciliation re-derives the remaining environments itself.
pub async fn process_custom_resource(
    registry: &FleetRegistry,
    config: &ReplicatorConfig,
    cluster: &str,
    resource: &TrafficRoutingResource,
    hooks: &dyn WorkloadHooks,
) -> Result<()> {
    let handle = registry.get_cluster_handle(cluster).ok_or_else(|| {
        ReplicationError::ClusterNotReady {
            cluster: cluster.to_string(),
            reason: "cluster handle not found in fleet registry".to_string(),
        }
    })?;

    let identity = resource
        .label(&config.identity_label)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ReplicationError::Precondition(format!(
                "custom resource {} is missing the {} label",
                resource.name, config.identity_label
            ))
        })?;
    let env_annotation = resource
        .annotation(&config.env_annotation)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ReplicationError::Precondition(format!(
                "custom resource {} is missing the {} annotation",
                resource.name, config.env_annotation
            ))
        })?;
    let env = env_annotation.split('_').next().unwrap_or(env_annotation);

    let legacy = legacy_identity_variant(identity);
    let mut errors = Vec::new();
    let mut matched = false;

    let rollout = handle.rollouts.as_deref().and_then(|r| {
        r.get_cached(identity, env)
            .or_else(|| r.get_cached(&legacy, env))
    });
    if let Some(rollout) = rollout {
        matched = true;
        info!(
            cluster,
            name = %resource.name,
            rollout = %rollout.name,
            identity,
            env,
            "custom resource owned by rollout, re-triggering reconciliation"
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

    let deployment = handle.deployments.as_deref().and_then(|d| {
        d.get_cached(identity, env)
            .or_else(|| d.get_cached(&legacy, env))
    });
    if let Some(deployment) = deployment {
        matched = true;
        info!(
            cluster,
            name = %resource.name,
            deployment = %deployment.name,
            identity,
            env,
            "custom resource owned by deployment, re-triggering reconciliation"
        );
        let deployment_name = deployment.name.clone();
        if let Err(e) = hooks.deployment_updated(cluster, deployment).await {
            errors.push(ReplicationError::cluster(
                cluster,
                "deployment_updated",
                deployment_name,
                e,
            ));
        }
    }

    if !matched {
        info!(
            cluster,
            name = %resource.name,
            identity,
            env,
            "no cached workload matches the custom resource"
        );
    }
    ReplicationError::aggregate(errors)
}
