//! The bulk-action state machine.
//!
//! Owns the selection and the bulk state; everything else mutates them only
//! through the controller's methods. `&mut self` gives single-writer
//! discipline without locks: one bulk action at a time, by construction.

#![forbid(unsafe_code)]

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use rostra_api::{
    ConfirmationGate, CourseBackend, Notifier, OperationDescriptor, RostraError, RostraResult,
    Severity,
};
use rostra_core::{BatchResult, BulkState, EntityId, SelectionSet, StudentRecord};

use crate::aggregate::{aggregate, summary};
use crate::dispatch::dispatch;
use crate::reconcile::{spawn_reconciliation, ReconcilePolicy, RefreshFn};
use crate::BulkConfig;

/// Sequences Idle → Confirming → Dispatching → Aggregating → Reporting → Idle
/// for one bulk action at a time.
pub struct BulkController {
    backend: Arc<dyn CourseBackend>,
    gate: Arc<dyn ConfirmationGate>,
    notifier: Arc<dyn Notifier>,
    refresh: RefreshFn,
    config: BulkConfig,
    policy: ReconcilePolicy,
    roster: Vec<StudentRecord>,
    selection: SelectionSet,
    state: BulkState,
    reconcile_task: Option<JoinHandle<()>>,
}

impl BulkController {
    pub fn new(
        backend: Arc<dyn CourseBackend>,
        gate: Arc<dyn ConfirmationGate>,
        notifier: Arc<dyn Notifier>,
        refresh: RefreshFn,
    ) -> Self {
        Self {
            backend,
            gate,
            notifier,
            refresh,
            config: BulkConfig::from_env(),
            policy: ReconcilePolicy::from_env(),
            roster: Vec::new(),
            selection: SelectionSet::new(),
            state: BulkState::Idle,
            reconcile_task: None,
        }
    }

    pub fn with_config(mut self, config: BulkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> BulkState {
        self.state
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn toggle(&mut self, id: impl Into<EntityId>) {
        self.selection.toggle(id);
    }

    pub fn select_all<I, T>(&mut self, ids: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityId>,
    {
        self.selection.select_all(ids);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Replace the cached roster and prune the selection so dispatch never
    /// targets an entity that no longer exists.
    pub fn sync_roster(&mut self, roster: Vec<StudentRecord>) {
        self.roster = roster;
        let known: Vec<&str> = self.roster.iter().map(|r| r.id.as_str()).collect();
        self.selection.retain_known(known);
    }

    /// Selection resolved against roster records, in selection order.
    fn preview(&self) -> Vec<StudentRecord> {
        self.selection
            .iter()
            .filter_map(|id| self.roster.iter().find(|r| &r.id == id))
            .cloned()
            .collect()
    }

    /// Run a bulk action over the current selection; no cancellation path
    /// once dispatch begins.
    pub async fn run(&mut self, descriptor: OperationDescriptor) -> RostraResult<Option<BatchResult>> {
        self.run_with_cancel(descriptor, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), with a token that can stop admitting
    /// not-yet-started items mid-batch.
    ///
    /// Returns `Ok(None)` when nothing was dispatched (empty selection, or
    /// the confirmation gate declined; selection preserved in both cases).
    pub async fn run_with_cancel(
        &mut self,
        descriptor: OperationDescriptor,
        cancel: CancellationToken,
    ) -> RostraResult<Option<BatchResult>> {
        if self.state != BulkState::Idle {
            return Err(RostraError::Conflict("a bulk action is already in progress".into()));
        }
        descriptor.validate()?;
        if self.selection.is_empty() {
            debug!(verb = %descriptor.verb, "bulk: empty selection, nothing to do");
            return Ok(None);
        }

        let verb = descriptor.verb;
        if verb.is_destructive() {
            self.state = BulkState::Confirming;
            let preview = self.preview();
            if !self.gate.confirm(&preview, verb).await {
                info!(verb = %verb, selected = self.selection.len(), "bulk: declined at confirmation");
                self.state = BulkState::Idle;
                return Ok(None);
            }
        }

        self.state = BulkState::Dispatching;
        let ids = self.selection.to_vec();
        let outcomes = match dispatch(
            Arc::clone(&self.backend),
            ids,
            &descriptor,
            self.config.concurrency,
            cancel,
        )
        .await
        {
            Ok(outcomes) => outcomes,
            Err(e) => {
                // Escaped the per-item capture boundary: fatal to this batch,
                // selection preserved so the user can retry.
                error!(verb = %verb, error = %e, "bulk: dispatch contract violation");
                self.notifier.notify(&format!("Bulk {verb} failed: {e}"), Severity::Error);
                self.state = BulkState::Idle;
                return Err(e);
            }
        };

        self.state = BulkState::Aggregating;
        let result = aggregate(&outcomes);

        self.state = BulkState::Reporting;
        let (message, severity) = summary(&result, verb);
        self.notifier.notify(&message, severity);
        // A fresh schedule supersedes any still-running one; its immediate
        // pass re-fetches whatever the old schedule still owed.
        if let Some(stale) = self.reconcile_task.take() {
            stale.abort();
        }
        self.reconcile_task =
            Some(spawn_reconciliation(self.policy.clone(), Arc::clone(&self.refresh)));
        self.selection.clear();
        self.state = BulkState::Idle;
        info!(
            verb = %verb,
            ok = result.success_count,
            failed = result.failure_count,
            "bulk: batch reported"
        );
        Ok(Some(result))
    }

    /// Await the most recent reconciliation schedule. Useful for shutdown
    /// and tests; the schedule otherwise runs detached.
    pub async fn finish_reconciliation(&mut self) {
        if let Some(task) = self.reconcile_task.take() {
            let _ = task.await;
        }
    }
}
