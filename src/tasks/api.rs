//! Remote job service: the `JobApi` trait and its HTTP implementation.
//!
//! Wire format (JSON over HTTP, all under `{base_url}/api/v1`):
//!
//! | Call                   | Request                                          | Response                                   |
//! |------------------------|--------------------------------------------------|--------------------------------------------|
//! | `POST /data`           | `{audio_data: b64, environmental_data: {…}}`     | `{task_id}` (or `{id}`)                    |
//! | `GET /tasks/{id}`      | –                                                | `{status, result?: {audio_data, format?}, error?}` |
//! | `POST /tasks/status`   | `{task_ids: [...]}`                              | `{ready: bool}`                            |
//!
//! `status` is one of `pending`, `completed`, `failed`.

use std::fmt;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ApiConfig;
use crate::hardware::EnvironmentReading;

// ---------------------------------------------------------------------------
// SubmissionError
// ---------------------------------------------------------------------------

/// Errors talking to the job service.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("job service request timed out")]
    Timeout,

    #[error("job service answered HTTP {0}")]
    Status(u16),

    /// The response body did not have the expected shape.
    #[error("failed to parse job service response: {0}")]
    Parse(String),

    #[error("task {0} is not tracked")]
    UnknownTask(TaskId),
}

impl From<reqwest::Error> for SubmissionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SubmissionError::Timeout
        } else if let Some(status) = e.status() {
            SubmissionError::Status(status.as_u16())
        } else {
            SubmissionError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// Opaque identifier issued by the job service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One recorded cycle plus the room conditions it was captured in.
#[derive(Debug, Clone)]
pub struct JobSubmission {
    /// Encoded audio file bytes (WAV).
    pub audio: Vec<u8>,
    pub readings: EnvironmentReading,
}

/// Finished job output.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    /// Encoded audio bytes, decoded for playback.
    pub audio: Vec<u8>,
    /// Container hint such as `"mp3"`, when the service names one.
    pub format: Option<String>,
    /// Any other fields the service attached.
    pub metadata: Map<String, Value>,
}

/// Remote status of one task.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending,
    Completed(JobResult),
    Failed(Option<String>),
}

// ---------------------------------------------------------------------------
// JobApi trait
// ---------------------------------------------------------------------------

/// Async access to the job service.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn JobApi>`.
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn submit(&self, submission: &JobSubmission) -> Result<TaskId, SubmissionError>;

    async fn query(&self, id: &TaskId) -> Result<JobStatus, SubmissionError>;

    /// Cheap bulk check: has any of `ids` finished (completed or failed)?
    async fn any_ready(&self, ids: &[TaskId]) -> Result<bool, SubmissionError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SubmitBody<'a> {
    audio_data: String,
    environmental_data: &'a EnvironmentReading,
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(alias = "id")]
    task_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: WireStatus,
    #[serde(default)]
    result: Option<WireResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct WireResult {
    audio_data: String,
    #[serde(default)]
    format: Option<String>,
    #[serde(flatten)]
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
struct ReadyBody<'a> {
    task_ids: &'a [TaskId],
}

#[derive(Deserialize)]
struct ReadyResponse {
    ready: bool,
}

fn submission_body(submission: &JobSubmission) -> SubmitBody<'_> {
    SubmitBody {
        audio_data: STANDARD.encode(&submission.audio),
        environmental_data: &submission.readings,
    }
}

fn parse_submit_response(body: &[u8]) -> Result<TaskId, SubmissionError> {
    let parsed: SubmitResponse =
        serde_json::from_slice(body).map_err(|e| SubmissionError::Parse(e.to_string()))?;
    if parsed.task_id.trim().is_empty() {
        return Err(SubmissionError::Parse("empty task id".into()));
    }
    Ok(TaskId(parsed.task_id))
}

fn parse_status_response(body: &[u8]) -> Result<JobStatus, SubmissionError> {
    let parsed: StatusResponse =
        serde_json::from_slice(body).map_err(|e| SubmissionError::Parse(e.to_string()))?;

    match parsed.status {
        WireStatus::Pending => Ok(JobStatus::Pending),
        WireStatus::Failed => Ok(JobStatus::Failed(parsed.error)),
        WireStatus::Completed => {
            let result = parsed
                .result
                .ok_or_else(|| SubmissionError::Parse("completed task has no result".into()))?;
            let audio = STANDARD
                .decode(result.audio_data.as_bytes())
                .map_err(|e| SubmissionError::Parse(format!("result audio: {e}")))?;
            Ok(JobStatus::Completed(JobResult {
                audio,
                format: result.format,
                metadata: result.metadata,
            }))
        }
    }
}

fn parse_ready_response(body: &[u8]) -> Result<bool, SubmissionError> {
    let parsed: ReadyResponse =
        serde_json::from_slice(body).map_err(|e| SubmissionError::Parse(e.to_string()))?;
    Ok(parsed.ready)
}

// ---------------------------------------------------------------------------
// HttpJobApi
// ---------------------------------------------------------------------------

/// [`JobApi`] over HTTP with `reqwest`.
///
/// All connection details come from [`ApiConfig`]; nothing is hardcoded.
pub struct HttpJobApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobApi {
    /// Build a client with the per-request timeout from `config`.  Falls back
    /// to a default client if the builder fails.
    pub fn from_config(config: &ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, SubmissionError> {
        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn submit(&self, submission: &JobSubmission) -> Result<TaskId, SubmissionError> {
        let response = self
            .client
            .post(self.url("data"))
            .json(&submission_body(submission))
            .send()
            .await?;
        parse_submit_response(&Self::read_body(response).await?)
    }

    async fn query(&self, id: &TaskId) -> Result<JobStatus, SubmissionError> {
        let response = self
            .client
            .get(self.url(&format!("tasks/{id}")))
            .send()
            .await?;
        parse_status_response(&Self::read_body(response).await?)
    }

    async fn any_ready(&self, ids: &[TaskId]) -> Result<bool, SubmissionError> {
        let response = self
            .client
            .post(self.url("tasks/status"))
            .json(&ReadyBody { task_ids: ids })
            .send()
            .await?;
        parse_ready_response(&Self::read_body(response).await?)
    }
}

// ---------------------------------------------------------------------------
// MockJobApi (test only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockJobApi;

#[cfg(test)]
mod mock {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{JobApi, JobResult, JobStatus, JobSubmission, SubmissionError, TaskId};

    /// In-memory job service.  Ids are issued as `task-1`, `task-2`, …
    #[derive(Default)]
    pub struct MockJobApi {
        statuses: Mutex<HashMap<TaskId, JobStatus>>,
        submissions: Mutex<Vec<JobSubmission>>,
        next_id: AtomicUsize,
        fail_submit: AtomicBool,
        fail_bulk: AtomicBool,
        pub queries: AtomicUsize,
        pub ready_checks: AtomicUsize,
    }

    impl MockJobApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_status(&self, id: &str, status: JobStatus) {
            self.statuses.lock().unwrap().insert(TaskId::new(id), status);
        }

        pub fn complete(&self, id: &str, audio: Vec<u8>) {
            self.set_status(
                id,
                JobStatus::Completed(JobResult {
                    audio,
                    format: Some("wav".into()),
                    metadata: Default::default(),
                }),
            );
        }

        pub fn submissions(&self) -> Vec<JobSubmission> {
            self.submissions.lock().unwrap().clone()
        }

        pub fn fail_submissions(&self, fail: bool) {
            self.fail_submit.store(fail, Ordering::SeqCst);
        }

        pub fn fail_bulk_checks(&self, fail: bool) {
            self.fail_bulk.store(fail, Ordering::SeqCst);
        }

        pub fn query_count(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobApi for MockJobApi {
        async fn submit(&self, submission: &JobSubmission) -> Result<TaskId, SubmissionError> {
            if self.fail_submit.load(Ordering::SeqCst) {
                return Err(SubmissionError::Request("connection refused".into()));
            }
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let id = TaskId::new(format!("task-{n}"));
            self.statuses
                .lock()
                .unwrap()
                .insert(id.clone(), JobStatus::Pending);
            self.submissions.lock().unwrap().push(submission.clone());
            Ok(id)
        }

        async fn query(&self, id: &TaskId) -> Result<JobStatus, SubmissionError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or(SubmissionError::Status(404))
        }

        async fn any_ready(&self, ids: &[TaskId]) -> Result<bool, SubmissionError> {
            self.ready_checks.fetch_add(1, Ordering::SeqCst);
            if self.fail_bulk.load(Ordering::SeqCst) {
                return Err(SubmissionError::Status(503));
            }
            let statuses = self.statuses.lock().unwrap();
            Ok(ids.iter().any(|id| {
                matches!(
                    statuses.get(id),
                    Some(JobStatus::Completed(_)) | Some(JobStatus::Failed(_))
                )
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
