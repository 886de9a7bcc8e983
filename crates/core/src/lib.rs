//! Rostra core types

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod selection;

pub use selection::SelectionSet;

/// Opaque identifier for a selectable entity (e.g. a student).
/// Unique within the currently loaded roster.
pub type EntityId = String;

/// Display record for a roster entity, as supplied by the data-loading
/// collaborator. Confirmation previews resolve selections against these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentRecord {
    pub id: EntityId,
    pub name: String,
    pub email: String,
}

/// The bulk verbs the console supports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BulkVerb {
    /// Enroll into a course.
    Enroll,
    /// Remove from a course (keeps the account).
    Remove,
    /// Delete the account entirely.
    Delete,
}

impl BulkVerb {
    /// Infinitive label, used in failure messages ("Failed to enroll ...").
    pub fn label(&self) -> &'static str {
        match self {
            BulkVerb::Enroll => "enroll",
            BulkVerb::Remove => "remove",
            BulkVerb::Delete => "delete",
        }
    }

    /// Past-tense label, used in success messages ("Successfully enrolled ...").
    pub fn past_tense(&self) -> &'static str {
        match self {
            BulkVerb::Enroll => "enrolled",
            BulkVerb::Remove => "removed",
            BulkVerb::Delete => "deleted",
        }
    }

    /// Destructive verbs require explicit confirmation before dispatch.
    /// Removal from a course counts as destructive, matching console behavior.
    pub fn is_destructive(&self) -> bool {
        matches!(self, BulkVerb::Remove | BulkVerb::Delete)
    }
}

impl std::fmt::Display for BulkVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one dispatched per-entity call. Created once per call,
/// immutable afterwards, consumed only by aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemOutcome {
    pub entity_id: EntityId,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

impl ItemOutcome {
    pub fn success(entity_id: impl Into<EntityId>) -> Self {
        Self { entity_id: entity_id.into(), succeeded: true, error_detail: None }
    }

    pub fn failure(entity_id: impl Into<EntityId>, detail: impl Into<String>) -> Self {
        Self { entity_id: entity_id.into(), succeeded: false, error_detail: Some(detail.into()) }
    }
}

/// One failed entity inside a [`BatchResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemFailure {
    pub entity_id: EntityId,
    pub error_detail: String,
}

/// Aggregate over a batch of [`ItemOutcome`]s. Derived, never mutated;
/// recomputed per batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BatchResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub failures: Vec<ItemFailure>,
}

impl BatchResult {
    /// Total number of settled items.
    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }
}

/// State of the bulk-action controller. Owned exclusively by the controller;
/// exactly one bulk action may be active at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BulkState {
    Idle,
    Confirming,
    Dispatching,
    Aggregating,
    Reporting,
}
