//! Rostra public API façade (in-process).
//!
//! This crate defines the stable traits and types the orchestrator and
//! frontends depend on. Implementations can be in-process (mock) or remote
//! (the HTTP backend in `rostra-client`).

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use rostra_core::{BulkVerb, EntityId, StudentRecord};

/// API errors suitable for transport over RPC later.
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
pub enum RostraError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Non-2xx with a server-reported message. Displays as the bare message
    /// so it can be surfaced verbatim as a per-item error detail.
    #[error("{message}")]
    Backend { status: u16, message: String },
    #[error("transport: {0}")]
    Transport(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type RostraResult<T> = Result<T, RostraError>;

/// Optional payload for enrollment calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnrollOptions {
    /// Initial progress value, 0.0..=100.0, when the console pre-seeds it.
    pub progress: Option<f64>,
}

/// Describes one bulk action: a verb, the target scope required by
/// enroll/remove (a course), and an optional payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationDescriptor {
    pub verb: BulkVerb,
    pub course_id: Option<String>,
    pub options: EnrollOptions,
}

impl OperationDescriptor {
    pub fn enroll(course_id: impl Into<String>, options: EnrollOptions) -> Self {
        Self { verb: BulkVerb::Enroll, course_id: Some(course_id.into()), options }
    }

    pub fn remove(course_id: impl Into<String>) -> Self {
        Self { verb: BulkVerb::Remove, course_id: Some(course_id.into()), options: EnrollOptions::default() }
    }

    pub fn delete() -> Self {
        Self { verb: BulkVerb::Delete, course_id: None, options: EnrollOptions::default() }
    }

    /// Course-scoped verbs must carry a course id; checked before any dispatch.
    pub fn validate(&self) -> RostraResult<()> {
        match self.verb {
            BulkVerb::Enroll | BulkVerb::Remove if self.course_id.is_none() => Err(
                RostraError::Validation(format!("{} requires a course id", self.verb)),
            ),
            _ => Ok(()),
        }
    }
}

/// Per-entity remote operations plus roster loading.
///
/// Each method maps to exactly one backend request; the orchestrator issues
/// one call per selected entity and recovers failures individually.
#[async_trait::async_trait]
pub trait CourseBackend: Send + Sync {
    async fn enroll_student(
        &self,
        course_id: &str,
        student_id: &str,
        options: &EnrollOptions,
    ) -> RostraResult<()>;

    async fn remove_student(&self, course_id: &str, student_id: &str) -> RostraResult<()>;

    async fn delete_student(&self, student_id: &str) -> RostraResult<()>;

    /// Authoritative roster, re-fetched by reconciliation passes.
    async fn list_students(&self) -> RostraResult<Vec<StudentRecord>>;
}

/// Gate for destructive verbs: shown the resolved selection, must return
/// `true` before the controller may leave `Confirming`.
#[async_trait::async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn confirm(&self, preview: &[StudentRecord], verb: BulkVerb) -> bool;
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
}

/// Sink for the single summary toast per batch.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

// ----------------- Mock implementations -----------------

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory backend for tests and demos.
///
/// Failures are scripted per entity; call accounting exposes the number of
/// issued requests and the peak number of concurrently in-flight requests.
#[derive(Default)]
pub struct MockBackend {
    students: Mutex<Vec<StudentRecord>>,
    fail_with: Mutex<HashMap<EntityId, String>>,
    panic_on: Mutex<Vec<EntityId>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_students(students: Vec<StudentRecord>) -> Self {
        Self { students: Mutex::new(students), ..Self::default() }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Script the next calls for `id` to fail with a server-style message.
    pub fn fail_with(&self, id: impl Into<EntityId>, message: impl Into<String>) {
        self.fail_with.lock().unwrap().insert(id.into(), message.into());
    }

    /// Script calls for `id` to panic, simulating a contract violation that
    /// escapes per-item outcome capture.
    pub fn panic_on(&self, id: impl Into<EntityId>) {
        self.panic_on.lock().unwrap().push(id.into());
    }

    /// Number of per-entity mutation requests issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn student_ids(&self) -> Vec<EntityId> {
        self.students.lock().unwrap().iter().map(|s| s.id.clone()).collect()
    }

    async fn call(&self, student_id: &str) -> RostraResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.panic_on.lock().unwrap().iter().any(|id| id == student_id) {
            panic!("scripted panic for {student_id}");
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let scripted = self.fail_with.lock().unwrap().get(student_id).cloned();
        match scripted {
            Some(message) => Err(RostraError::Backend { status: 409, message }),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl CourseBackend for MockBackend {
    async fn enroll_student(
        &self,
        _course_id: &str,
        student_id: &str,
        _options: &EnrollOptions,
    ) -> RostraResult<()> {
        self.call(student_id).await
    }

    async fn remove_student(&self, _course_id: &str, student_id: &str) -> RostraResult<()> {
        self.call(student_id).await
    }

    async fn delete_student(&self, student_id: &str) -> RostraResult<()> {
        self.call(student_id).await?;
        self.students.lock().unwrap().retain(|s| s.id != student_id);
        Ok(())
    }

    async fn list_students(&self) -> RostraResult<Vec<StudentRecord>> {
        Ok(self.students.lock().unwrap().clone())
    }
}

/// Gate with a pre-scripted answer; records what it was shown.
#[derive(Default)]
pub struct StaticGate {
    answer: bool,
    seen: Mutex<Vec<(usize, BulkVerb)>>,
}

impl StaticGate {
    pub fn confirming() -> Self {
        Self { answer: true, seen: Mutex::new(Vec::new()) }
    }

    pub fn declining() -> Self {
        Self { answer: false, seen: Mutex::new(Vec::new()) }
    }

    /// `(preview length, verb)` pairs for every confirmation request shown.
    pub fn seen(&self) -> Vec<(usize, BulkVerb)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ConfirmationGate for StaticGate {
    async fn confirm(&self, preview: &[StudentRecord], verb: BulkVerb) -> bool {
        self.seen.lock().unwrap().push((preview.len(), verb));
        self.answer
    }
}

/// Notifier that buffers toasts for assertions.
#[derive(Default)]
pub struct BufferNotifier {
    toasts: Mutex<Vec<(String, Severity)>>,
}

impl BufferNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<(String, Severity)> {
        self.toasts.lock().unwrap().clone()
    }
}

impl Notifier for BufferNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.toasts.lock().unwrap().push((message.to_string(), severity));
    }
}
