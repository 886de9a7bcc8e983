//! Best-effort reconciliation against an eventually-consistent backend.
//!
//! The backend's write path can commit after the HTTP response has already
//! been sent, so a single refresh at batch completion can miss state. The
//! scheduler re-fires the refresh on a small fixed schedule; every pass is
//! advisory and failures are logged, never surfaced.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use rostra_api::RostraResult;

/// Refresh callback supplied by the data-loading collaborator.
pub type RefreshFn = Arc<dyn Fn() -> BoxFuture<'static, RostraResult<()>> + Send + Sync>;

/// Offsets (from batch completion) at which delayed refresh passes fire.
/// An immediate pass always runs first; how many delayed passes are "enough"
/// is policy, not a guarantee.
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    pub delays: Vec<Duration>,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self { delays: vec![Duration::from_secs(1), Duration::from_secs(3)] }
    }
}

impl ReconcilePolicy {
    /// `ROSTRA_RECONCILE_DELAYS_MS` overrides the schedule, e.g. "1000,3000".
    pub fn from_env() -> Self {
        match std::env::var("ROSTRA_RECONCILE_DELAYS_MS") {
            Ok(raw) => {
                let delays: Vec<Duration> = raw
                    .split(',')
                    .filter_map(|part| part.trim().parse::<u64>().ok())
                    .map(Duration::from_millis)
                    .collect();
                if delays.is_empty() {
                    Self::default()
                } else {
                    Self { delays }
                }
            }
            Err(_) => Self::default(),
        }
    }
}

/// Fire `refresh` now and once per configured offset. Each pass is
/// independent: a failing refresh is logged and the schedule keeps going.
pub fn spawn_reconciliation(policy: ReconcilePolicy, refresh: RefreshFn) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_pass(&refresh, 0).await;
        let mut elapsed = Duration::ZERO;
        for (i, offset) in policy.delays.iter().enumerate() {
            tokio::time::sleep(offset.saturating_sub(elapsed)).await;
            elapsed = *offset;
            run_pass(&refresh, i + 1).await;
        }
        debug!(passes = policy.delays.len() + 1, "reconcile: schedule complete");
    })
}

async fn run_pass(refresh: &RefreshFn, pass: usize) {
    match refresh().await {
        Ok(()) => debug!(pass, "reconcile: refresh ok"),
        Err(e) => warn!(pass, error = %e, "reconcile: refresh failed"),
    }
}
