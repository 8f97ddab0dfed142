//! Error types for the replication engine.
//!
//! Errors fall into a small taxonomy that drives how callers react:
//!
//! | Error Type | Retried | Description |
//! |------------|---------|-------------|
//! | `Precondition` | No | Missing config or programming error (empty sync namespace, no registry) |
//! | `ClusterNotReady` | No | Target cluster handle or its client is not initialized |
//! | `Cluster` | Next resync | A per-cluster API call failed and was not downgraded |
//! | `RolloutLookup` | No | Rollout listing failed, canary ownership undecidable |
//! | `Aggregate` | Next resync | One combined error for a fan-out with partial failures |
//! | `Internal` | No | Unexpected engine fault, a fan-out worker panicked |
//!
//! Fan-out callers log `Aggregate` and move on: every reconciliation is
//! idempotent, so the next watch event or periodic resync converges the
//! fleet without an in-process retry loop.

use crate::cluster::ApiError;
use thiserror::Error;

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors surfaced by the replication pipeline.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// Missing required input or configuration.
    ///
    /// Returned immediately, never retried: fix the config or the caller.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A target cluster's handle or sub-client is not initialized.
    ///
    /// Hard error for that cluster only; other clusters are unaffected.
    #[error("cluster {cluster} not ready: {reason}")]
    ClusterNotReady { cluster: String, reason: String },

    /// A per-cluster API operation failed.
    #[error("cluster {cluster}: {operation} {name} failed: {source}")]
    Cluster {
        cluster: String,
        operation: &'static str,
        name: String,
        #[source]
        source: ApiError,
    },

    /// Rollout listing failed while resolving canary ownership.
    ///
    /// Fatal to the resolver call: ownership cannot be determined without
    /// the listing, so the event handler surfaces this to the watcher.
    #[error("rollout listing failed in namespace {namespace}: {source}")]
    RolloutLookup {
        namespace: String,
        #[source]
        source: ApiError,
    },

    /// Combined per-cluster errors from one fan-out call.
    ///
    /// A failure on one cluster never prevents attempts on the others;
    /// everything that failed is collected here.
    #[error("sync failed for {} cluster(s): [{}]", errors.len(), format_aggregate(errors))]
    Aggregate { errors: Vec<ReplicationError> },

    /// Unexpected internal error (a fan-out worker panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReplicationError {
    /// Build the per-cluster API error variant.
    pub fn cluster(
        cluster: impl Into<String>,
        operation: &'static str,
        name: impl Into<String>,
        source: ApiError,
    ) -> Self {
        Self::Cluster {
            cluster: cluster.into(),
            operation,
            name: name.into(),
            source,
        }
    }

    /// Collapse a list of per-cluster errors into one combined error.
    ///
    /// Returns `Ok(())` when the list is empty.
    pub fn aggregate(errors: Vec<ReplicationError>) -> Result<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::Aggregate { errors })
        }
    }

    /// Whether the next resync is expected to repair this failure.
    ///
    /// Precondition and not-ready errors need operator or caller attention;
    /// everything else converges through idempotent reconciliation.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Precondition(_) => false,
            Self::ClusterNotReady { .. } => false,
            Self::Cluster { .. } => true,
            Self::RolloutLookup { .. } => true,
            Self::Aggregate { errors } => errors.iter().any(|e| e.is_transient()),
            Self::Internal(_) => false,
        }
    }
}

fn format_aggregate(errors: &[ReplicationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
