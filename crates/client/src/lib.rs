//! Rostra HTTP backend – REST client wiring for the learning platform.

#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rostra_api::{CourseBackend, EnrollOptions, RostraError, RostraResult};
use rostra_core::StudentRecord;

/// Transport-level knobs for the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30) }
    }
}

impl HttpConfig {
    /// `ROSTRA_HTTP_TIMEOUT_SECS` overrides the default request timeout.
    pub fn from_env() -> Self {
        let timeout_secs: u64 = std::env::var("ROSTRA_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        Self { timeout: Duration::from_secs(timeout_secs) }
    }
}

/// `CourseBackend` implementation over the platform's REST API.
///
/// Every request carries the bearer credential supplied at construction.
/// The client does not retry; per-item retry policy belongs to the caller.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> RostraResult<Self> {
        Self::with_config(base_url, token, HttpConfig::from_env())
    }

    pub fn with_config(
        base_url: impl Into<String>,
        token: impl Into<String>,
        config: HttpConfig,
    ) -> RostraResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RostraError::Internal(format!("building http client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url, token: token.into() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Serialize)]
struct EnrollBody<'a> {
    student_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<f64>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Loose classification of a non-2xx response: a structured `{error}` body
/// wins, otherwise the status text stands in for the server message.
fn classify(status: StatusCode, body: &str) -> RostraError {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.error {
            return RostraError::Backend { status: status.as_u16(), message };
        }
    }
    let message = status
        .canonical_reason()
        .map(|r| r.to_string())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    RostraError::Backend { status: status.as_u16(), message }
}

fn transport(e: reqwest::Error) -> RostraError {
    RostraError::Transport(e.to_string())
}

async fn check(resp: reqwest::Response) -> RostraResult<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify(status, &body))
}

#[async_trait::async_trait]
impl CourseBackend for HttpBackend {
    async fn enroll_student(
        &self,
        course_id: &str,
        student_id: &str,
        options: &EnrollOptions,
    ) -> RostraResult<()> {
        debug!(course = %course_id, student = %student_id, "client: enroll");
        let body = EnrollBody { student_id, progress: options.progress };
        let resp = self
            .http
            .post(self.url(&format!("/api/courses/{course_id}/enrollments")))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await
    }

    async fn remove_student(&self, course_id: &str, student_id: &str) -> RostraResult<()> {
        debug!(course = %course_id, student = %student_id, "client: remove");
        let resp = self
            .http
            .delete(self.url(&format!("/api/courses/{course_id}/enrollments/{student_id}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await
    }

    async fn delete_student(&self, student_id: &str) -> RostraResult<()> {
        debug!(student = %student_id, "client: delete");
        let resp = self
            .http
            .delete(self.url(&format!("/api/students/{student_id}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await
    }

    async fn list_students(&self) -> RostraResult<Vec<StudentRecord>> {
        let t0 = Instant::now();
        let resp = self
            .http
            .get(self.url("/api/students"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify(status, &body));
        }
        let students: Vec<StudentRecord> = resp.json().await.map_err(transport)?;
        debug!(count = students.len(), took_ms = %t0.elapsed().as_millis(), "client: roster fetched");
        Ok(students)
    }
}
