//! Rostra bulk orchestration: bounded fan-out dispatch, result aggregation,
//! best-effort reconciliation, and the controller state machine tying them
//! together.

#![forbid(unsafe_code)]

pub mod aggregate;
pub mod controller;
pub mod dispatch;
pub mod reconcile;

pub use aggregate::{aggregate, summary};
pub use controller::BulkController;
pub use dispatch::dispatch;
pub use reconcile::{spawn_reconciliation, ReconcilePolicy, RefreshFn};

/// Tunables for the dispatcher.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Cap on concurrently in-flight per-entity calls. Selections can reach
    /// hundreds of entities; the cap keeps the backend from being swamped.
    pub concurrency: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl BulkConfig {
    /// `ROSTRA_BULK_CONCURRENCY` overrides the default worker cap.
    pub fn from_env() -> Self {
        let concurrency = std::env::var("ROSTRA_BULK_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8);
        Self { concurrency }
    }
}
