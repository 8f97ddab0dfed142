//! Configuration for the replication engine.
//!
//! One [`ReplicatorConfig`] is built by the daemon (programmatically or
//! deserialized from YAML/JSON) and shared read-only by every handler.
//!
//! # Quick Start
//!
//! ```rust
//! use fleet_replicator::config::ReplicatorConfig;
//!
//! let config = ReplicatorConfig {
//!     sync_namespace: "mesh-sync".into(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! sync_namespace: "mesh-sync"
//! local_domain_suffix: ".svc.cluster.local"
//! canary_resolution_enabled: true
//! ignored_namespaces: ["kube-system"]
//! state_syncer_mode: false
//! ```

use crate::error::{ReplicationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Resource kind label used in logs and state-registry mirror calls.
pub const RESOURCE_KIND: &str = "TrafficRouting";

/// Static configuration for the replication engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatorConfig {
    /// The namespace in every target cluster where replicated copies land.
    /// Must be non-empty; validated before any event is handled.
    pub sync_namespace: String,

    /// Internal "local" domain suffix. Route destinations ending in this
    /// suffix are rewritten to the governed hostname during replication,
    /// since in-cluster short names do not resolve from remote clusters.
    #[serde(default = "default_local_domain_suffix")]
    pub local_domain_suffix: String,

    /// Whether to consult rollouts for canary ownership before replicating.
    #[serde(default = "default_true")]
    pub canary_resolution_enabled: bool,

    /// Label carrying the owning workload identity on custom-owned resources.
    #[serde(default = "default_identity_label")]
    pub identity_label: String,

    /// Annotation carrying the "_"-delimited environment list on
    /// custom-owned resources.
    #[serde(default = "default_env_annotation")]
    pub env_annotation: String,

    /// `created-by` value marking resources as custom-owned (hand-authored
    /// feedback triggers). Such resources bypass the admission filter and
    /// route to the custom-resource processor. `None` disables the path.
    #[serde(default)]
    pub custom_owned_created_by: Option<String>,

    /// Annotation that excludes a resource from replication when `"true"`.
    #[serde(default = "default_ignore_annotation")]
    pub ignore_annotation: String,

    /// Namespaces whose resources are never replicated. The sync namespace
    /// itself is always ignored to keep replicated copies from re-entering
    /// the pipeline.
    #[serde(default = "default_ignored_namespaces")]
    pub ignored_namespaces: Vec<String>,

    /// Label marking cross-cluster-routing resources whose export scope is
    /// managed elsewhere and must not be overwritten.
    #[serde(default = "default_routing_marker_label")]
    pub routing_marker_label: String,

    /// Label/annotation keys stripped from every replicated copy.
    #[serde(default)]
    pub ignored_copy_keys: Vec<String>,

    /// Value stamped into the `app.kubernetes.io/created-by` annotation of
    /// every replicated copy.
    #[serde(default = "default_created_by")]
    pub created_by: String,

    /// Whether this fleet mirrors replication events to a state registry.
    #[serde(default)]
    pub state_syncer_mode: bool,

    /// Clusters designated as state syncers. Mirroring only fires for
    /// events originating from these clusters.
    #[serde(default)]
    pub syncer_clusters: BTreeSet<String>,
}

fn default_local_domain_suffix() -> String {
    ".svc.cluster.local".to_string()
}

fn default_identity_label() -> String {
    "replicator.mesh.io/identity".to_string()
}

fn default_env_annotation() -> String {
    "replicator.mesh.io/env".to_string()
}

fn default_ignore_annotation() -> String {
    "replicator.mesh.io/ignore".to_string()
}

fn default_ignored_namespaces() -> Vec<String> {
    vec!["kube-system".to_string()]
}

fn default_routing_marker_label() -> String {
    "replicator.mesh.io/vs-routing".to_string()
}

fn default_created_by() -> String {
    "fleet-replicator".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            sync_namespace: String::new(),
            local_domain_suffix: default_local_domain_suffix(),
            canary_resolution_enabled: true,
            identity_label: default_identity_label(),
            env_annotation: default_env_annotation(),
            custom_owned_created_by: None,
            ignore_annotation: default_ignore_annotation(),
            ignored_namespaces: default_ignored_namespaces(),
            routing_marker_label: default_routing_marker_label(),
            ignored_copy_keys: Vec::new(),
            created_by: default_created_by(),
            state_syncer_mode: false,
            syncer_clusters: BTreeSet::new(),
        }
    }
}

impl ReplicatorConfig {
    /// Minimal config for tests.
    pub fn for_testing(sync_namespace: &str) -> Self {
        Self {
            sync_namespace: sync_namespace.to_string(),
            ..Default::default()
        }
    }

    /// Fail fast on configuration a handler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sync_namespace.is_empty() {
            return Err(ReplicationError::Precondition(
                "expected valid value for sync namespace, got empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether events from this cluster are mirrored to the state registry.
    pub fn is_syncer_cluster(&self, cluster: &str) -> bool {
        self.state_syncer_mode && self.syncer_clusters.contains(cluster)
    }
}
