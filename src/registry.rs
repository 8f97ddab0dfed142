//! Fleet registry: cluster handles and the dependency graph.
//!
//! The registry is populated by external bootstrap before the engine runs;
//! the engine only reads it. Two indexes make up the dependency cache, both
//! keyed by governed hostname:
//!
//! - `host → dependent clusters`: clusters that consume the hostname
//! - `host → source clusters`: clusters that originate the hostname
//!
//! A third index carries the export-scope computation: for each
//! `(host, cluster)`, the sorted list of namespaces in that cluster allowed
//! to reference the replicated copy.

use crate::cluster::ClusterHandle;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Dependency-graph indexes, read by the engine, written by bootstrap.
#[derive(Default)]
pub struct DependencyCache {
    dependents: DashMap<String, BTreeSet<String>>,
    sources: DashMap<String, BTreeSet<String>>,
    /// `(host, cluster) → sorted dependent namespaces` for export scope.
    export_namespaces: DashMap<(String, String), Vec<String>>,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cluster as a dependent of a hostname.
    pub fn add_dependent(&self, host: &str, cluster: &str) {
        self.dependents
            .entry(host.to_string())
            .or_default()
            .insert(cluster.to_string());
    }

    /// Register a cluster as a source of a hostname.
    pub fn add_source(&self, host: &str, cluster: &str) {
        self.sources
            .entry(host.to_string())
            .or_default()
            .insert(cluster.to_string());
    }

    /// Set the export-scope namespace list for `(host, cluster)`.
    /// The list is sorted on insert; lookups return it verbatim.
    pub fn set_export_namespaces(&self, host: &str, cluster: &str, mut namespaces: Vec<String>) {
        namespaces.sort();
        self.export_namespaces
            .insert((host.to_string(), cluster.to_string()), namespaces);
    }

    /// Clusters that depend on the hostname. Sorted, possibly empty.
    pub fn dependent_clusters(&self, host: &str) -> Vec<String> {
        self.dependents
            .get(host)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Clusters that originate the hostname. Sorted, possibly empty.
    pub fn source_clusters(&self, host: &str) -> Vec<String> {
        self.sources
            .get(host)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sorted dependent namespaces for export scope, empty when unknown.
    pub fn sorted_dependent_namespaces(&self, host: &str, cluster: &str) -> Vec<String> {
        self.export_namespaces
            .get(&(host.to_string(), cluster.to_string()))
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

/// Process-wide map of cluster handles plus the dependency cache.
///
/// Shared behind an `Arc` by every handler and fan-out task. The engine
/// never mutates handles; bootstrap owns their lifecycle.
#[derive(Default)]
pub struct FleetRegistry {
    clusters: DashMap<String, Arc<ClusterHandle>>,
    dependency_cache: DependencyCache,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cluster handle. Called by bootstrap, and by tests.
    pub fn add_cluster(&self, handle: ClusterHandle) {
        self.clusters
            .insert(handle.cluster_id.clone(), Arc::new(handle));
    }

    /// Look up a cluster handle. `None` when the cluster is unknown.
    pub fn get_cluster_handle(&self, cluster_id: &str) -> Option<Arc<ClusterHandle>> {
        self.clusters.get(cluster_id).map(|r| r.value().clone())
    }

    /// Every cluster id in the fleet, sorted for deterministic fan-out order.
    pub fn list_cluster_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clusters.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn dependency_cache(&self) -> &DependencyCache {
        &self.dependency_cache
    }
}
