//! Outstanding remote jobs.
//!
//! The registry is pull-based: nothing polls on a timer.  The orchestrator
//! calls [`TaskRegistry::take_first_completed`] when the switch is pressed,
//! which costs one bulk readiness request and, only if something is ready,
//! one status query per tracked task in submission order.
//!
//! At most `max_tracked` tasks are kept; submitting past the limit drops
//! the oldest record, so unclaimed results cannot pile up between presses.
//!
//! ```text
//! submit ──▶ Pending ──poll──▶ Completed ──take──▶ (removed, handed to playback)
//!                      └─poll─▶ Failed ───────────▶ (removed, logged)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::{debug, info, warn};

use super::api::{JobApi, JobResult, JobStatus, JobSubmission, SubmissionError, TaskId};

/// Tracked-task limit used by [`TaskRegistry::new`].
pub const DEFAULT_MAX_TRACKED: usize = 64;

// ---------------------------------------------------------------------------
// TaskStatus / TaskRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }

    /// Status only moves forward: `Pending → Completed | Failed`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Pending)
                | (TaskStatus::Pending, TaskStatus::Completed)
                | (TaskStatus::Pending, TaskStatus::Failed)
        ) || *self == next
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Set once the task is `Completed`.
    pub payload: Option<JobResult>,
    pub submitted_at: Instant,
}

impl TaskRecord {
    fn new(id: TaskId) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            payload: None,
            submitted_at: Instant::now(),
        }
    }

    /// Apply a remote status.  Returns `false` (and changes nothing) if the
    /// remote reported a regression.
    fn apply(&mut self, remote: JobStatus) -> bool {
        let (next, payload) = match remote {
            JobStatus::Pending => (TaskStatus::Pending, None),
            JobStatus::Completed(result) => (TaskStatus::Completed, Some(result)),
            JobStatus::Failed(reason) => {
                warn!(
                    "task {}: failed remotely: {}",
                    self.id,
                    reason.as_deref().unwrap_or("no reason given")
                );
                (TaskStatus::Failed, None)
            }
        };

        if !self.status.can_transition_to(next) {
            warn!(
                "task {}: ignoring status regression {} -> {}",
                self.id,
                self.status.label(),
                next.label()
            );
            return false;
        }
        if next != self.status {
            debug!("task {}: {} -> {}", self.id, self.status.label(), next.label());
        }
        self.status = next;
        if payload.is_some() {
            self.payload = payload;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// TaskRegistry
// ---------------------------------------------------------------------------

pub struct TaskRegistry {
    api: Arc<dyn JobApi>,
    records: Mutex<Vec<TaskRecord>>,
    max_tracked: usize,
}

impl TaskRegistry {
    pub fn new(api: Arc<dyn JobApi>) -> Self {
        Self {
            api,
            records: Mutex::new(Vec::new()),
            max_tracked: DEFAULT_MAX_TRACKED,
        }
    }

    /// Keep at most `max` tasks (at least one).
    pub fn with_limit(mut self, max: usize) -> Self {
        self.max_tracked = max.max(1);
        self
    }

    pub fn max_tracked(&self) -> usize {
        self.max_tracked
    }

    fn records(&self) -> MutexGuard<'_, Vec<TaskRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send `submission` to the job service and start tracking the new id.
    pub async fn submit(&self, submission: &JobSubmission) -> Result<TaskId, SubmissionError> {
        let id = self.api.submit(submission).await?;
        info!(
            "task {id}: submitted ({} bytes of audio)",
            submission.audio.len()
        );
        let mut records = self.records();
        records.push(TaskRecord::new(id.clone()));
        if records.len() > self.max_tracked {
            let excess = records.len() - self.max_tracked;
            for dropped in records.drain(..excess) {
                warn!(
                    "task {}: dropped unclaimed ({}), registry holds {}",
                    dropped.id,
                    dropped.status.label(),
                    self.max_tracked
                );
            }
        }
        Ok(id)
    }

    /// Refresh one task from the service and return its record.
    ///
    /// Terminal records are returned as cached.  A task that reports
    /// `Failed` is removed from the registry; its final record is still
    /// returned.
    pub async fn poll_once(&self, id: &TaskId) -> Result<TaskRecord, SubmissionError> {
        {
            let records = self.records();
            let record = records
                .iter()
                .find(|r| &r.id == id)
                .ok_or_else(|| SubmissionError::UnknownTask(id.clone()))?;
            if record.status.is_terminal() {
                return Ok(record.clone());
            }
        }

        let remote = self.api.query(id).await?;

        let mut records = self.records();
        let index = records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| SubmissionError::UnknownTask(id.clone()))?;
        records[index].apply(remote);

        if records[index].status == TaskStatus::Failed {
            Ok(records.remove(index))
        } else {
            Ok(records[index].clone())
        }
    }

    /// The first of `ids` (in the given order) that is `Completed`.  The
    /// record stays tracked.  Query errors are logged and that id skipped.
    pub async fn find_first_completed(&self, ids: &[TaskId]) -> Option<TaskRecord> {
        for id in ids {
            match self.poll_once(id).await {
                Ok(record) if record.status == TaskStatus::Completed => return Some(record),
                Ok(_) => {}
                Err(e) => warn!("task {id}: status query failed: {e}"),
            }
        }
        None
    }

    /// Remove and return the oldest completed task, if any.
    ///
    /// A bulk readiness check runs first; if the service says nothing has
    /// finished no per-task queries are made.  If the bulk check itself
    /// fails the per-task queries run anyway.
    pub async fn take_first_completed(&self) -> Option<TaskRecord> {
        let ids = self.tracked_ids();
        if ids.is_empty() {
            return None;
        }

        match self.api.any_ready(&ids).await {
            Ok(false) => {
                debug!("registry: none of {} task(s) ready", ids.len());
                return None;
            }
            Ok(true) => {}
            Err(e) => warn!("registry: bulk status check failed, polling each task: {e}"),
        }

        let found = self.find_first_completed(&ids).await?;
        let mut records = self.records();
        let index = records.iter().position(|r| r.id == found.id)?;
        Some(records.remove(index))
    }

    /// Ids currently tracked, in submission order.
    pub fn tracked_ids(&self) -> Vec<TaskId> {
        self.records().iter().map(|r| r.id.clone()).collect()
    }

    pub fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        self.records().iter().find(|r| &r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
