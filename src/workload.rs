//! Workload object shapes consumed from external caches.
//!
//! The engine never mutates rollouts or deployments. It only inspects a
//! rollout's canary strategy to decide whether a traffic-routing resource is
//! canary-owned, and re-triggers workload update hooks when a custom-owned
//! resource changes.

use serde::{Deserialize, Serialize};

/// A progressive-delivery rollout, reduced to what the engine inspects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollout {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<CanaryStrategy>,
}

/// Canary strategy of a rollout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryStrategy {
    /// Traffic-routing integration, absent when the rollout shifts traffic
    /// by replica counts alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_routing: Option<TrafficRoutingRef>,
}

/// Reference from a canary strategy to this mesh's traffic-routing resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRoutingRef {
    /// Name of the traffic-routing resource the rollout drives.
    pub virtual_service_name: String,
}

impl Rollout {
    /// True iff this rollout's canary strategy drives the named
    /// traffic-routing resource through the mesh integration.
    pub fn references_routing_resource(&self, resource_name: &str) -> bool {
        self.canary
            .as_ref()
            .and_then(|c| c.traffic_routing.as_ref())
            .map(|t| t.virtual_service_name == resource_name)
            .unwrap_or(false)
    }
}

/// A deployment, reduced to the identity the engine keys cache lookups by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
    pub namespace: String,
}
