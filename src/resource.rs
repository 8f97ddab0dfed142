//! The traffic-routing resource being replicated.
//!
//! A [`TrafficRoutingResource`] declares hostname-based HTTP/TLS routing
//! rules inside the mesh. The replication engine copies these resources
//! between clusters, renaming each copy to a deterministic
//! [`replication_name`] so that copies from different source namespaces can
//! coexist in one shared sync namespace.
//!
//! The engine only supports a single governed hostname per resource;
//! multi-host resources are rejected upstream in the dispatcher.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Event kinds delivered by the per-cluster watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Add,
    Update,
    Delete,
}

impl EventKind {
    /// Lowercase operation label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A destination a route forwards traffic to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDestination {
    /// Destination hostname. Rewritten during replication when it points at
    /// an in-cluster short name that would not resolve remotely.
    pub host: String,
    /// Optional subset (workload version) within the destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset: Option<String>,
}

/// One HTTP routing rule: a list of weighted destinations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRoute {
    #[serde(default)]
    pub route: Vec<RouteDestination>,
}

/// One TLS routing rule. Same route shape as HTTP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsRoute {
    #[serde(default)]
    pub route: Vec<RouteDestination>,
}

/// The spec of a traffic-routing resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSpec {
    /// Hostnames this resource governs. Replication requires exactly one.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// HTTP routing rules.
    #[serde(default)]
    pub http: Vec<HttpRoute>,
    /// TLS routing rules.
    #[serde(default)]
    pub tls: Vec<TlsRoute>,
    /// Namespaces allowed to reference this resource.
    #[serde(default)]
    pub export_to: Vec<String>,
}

/// A traffic-routing resource as observed from a cluster watcher.
///
/// Labels carry the creator/identity marker and annotations the environment
/// marker; both are required only on custom-owned resources (see the
/// custom-resource processor).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRoutingResource {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Server-assigned version used for optimistic-concurrency updates.
    /// Empty on objects that have never been written.
    #[serde(default)]
    pub resource_version: String,
    pub spec: RoutingSpec,
}

impl TrafficRoutingResource {
    /// The single governed hostname, if the resource has exactly one.
    pub fn governed_host(&self) -> Option<&str> {
        match self.spec.hosts.as_slice() {
            [host] => Some(host.as_str()),
            _ => None,
        }
    }

    /// Look up an annotation value.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Look up a label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Derive the deterministic name used for every replicated copy.
///
/// All copies land in one shared sync namespace, so the name embeds the
/// source namespace to stay unique across sources. The source's own name is
/// kept only for best-effort cleanup of legacy copies.
pub fn replication_name(source_namespace: &str, source_name: &str) -> String {
    format!("{source_namespace}-{source_name}")
}
