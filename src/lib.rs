//! # Fleet Replicator
//!
//! An event-driven engine that replicates mesh traffic-routing resources
//! across a fleet of clusters. A watcher in each source cluster feeds
//! add/update/delete events into a per-cluster [`handler::ResourceHandler`],
//! which filters, classifies, and fans the event out to every target cluster
//! that needs a copy.
//!
//! ## Architecture
//!
//! ```text
//! watcher events
//!       |
//!       v
//! +------------------+     +---------------------+
//! | ResourceHandler  | --> | canary resolver     |  rollout-owned? stop
//! | gate + dispatch  |     +---------------------+
//! |                  | --> | custom processor    |  hand-authored? re-trigger
//! +------------------+     +---------------------+
//!       |
//!       v  one task per target cluster
//! +------------------+     +---------------------+
//! | fan-out engine   | --> | per-cluster         |  rename, rewrite routes,
//! | join + aggregate |     | reconciler          |  create/update/delete
//! +------------------+     +---------------------+
//! ```
//!
//! ## Guarantees
//!
//! - **Idempotent**: replaying any event against a converged fleet is a
//!   no-op. There is no in-process retry loop beyond the conflict engine;
//!   the next resync repairs partial failures.
//! - **Isolated failures**: each target cluster is synced in its own task
//!   with its own copy of the resource. A dead or failing cluster is logged
//!   and skipped, never blocking the healthy fleet.
//! - **Deterministic naming**: every replicated copy is named
//!   `{source_namespace}-{source_name}` in one shared sync namespace.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fleet_replicator::config::ReplicatorConfig;
//! use fleet_replicator::handler::ResourceHandler;
//! use fleet_replicator::registry::FleetRegistry;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! # fn hooks() -> Arc<dyn fleet_replicator::cluster::WorkloadHooks> { unimplemented!() }
//! let registry = Arc::new(FleetRegistry::new());
//! let config = Arc::new(ReplicatorConfig {
//!     sync_namespace: "mesh-sync".into(),
//!     ..Default::default()
//! });
//! let read_only = Arc::new(AtomicBool::new(false));
//! let handler = ResourceHandler::new(registry, config, "east-1", hooks(), read_only)?;
//! # Ok::<(), fleet_replicator::error::ReplicationError>(())
//! ```

pub mod canary;
pub mod cluster;
pub mod config;
pub mod error;
pub mod fanout;
pub mod handler;
pub mod metrics;
pub mod processor;
pub mod reconciler;
pub mod registry;
pub mod resource;
pub mod workload;

pub use cluster::{ApiError, ApiResult, ClusterHandle};
pub use config::ReplicatorConfig;
pub use error::{ReplicationError, Result};
pub use handler::ResourceHandler;
pub use registry::FleetRegistry;
pub use resource::{EventKind, TrafficRoutingResource};
