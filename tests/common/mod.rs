//! Shared test fixtures: in-memory recording fakes for the per-cluster
//! capability traits, plus resource builders.

#![allow(dead_code)]

pub mod fake_cluster;

use fleet_replicator::resource::{
    HttpRoute, RouteDestination, RoutingSpec, TlsRoute, TrafficRoutingResource,
};

/// Install a test-writer subscriber so `RUST_LOG=debug cargo test` shows the
/// engine's structured logs per test. Safe to call from every test; only the
/// first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A single-host resource with one HTTP route pointing at an in-cluster
/// short name, the common shape produced by workload onboarding.
pub fn make_resource(name: &str, namespace: &str, host: &str) -> TrafficRoutingResource {
    TrafficRoutingResource {
        name: name.to_string(),
        namespace: namespace.to_string(),
        spec: RoutingSpec {
            hosts: vec![host.to_string()],
            http: vec![HttpRoute {
                route: vec![RouteDestination {
                    host: format!("{name}.{namespace}.svc.cluster.local"),
                    subset: None,
                }],
            }],
            tls: vec![TlsRoute {
                route: vec![RouteDestination {
                    host: format!("{name}.{namespace}.svc.cluster.local"),
                    subset: Some("stable".to_string()),
                }],
            }],
            export_to: Vec::new(),
        },
        ..Default::default()
    }
}
