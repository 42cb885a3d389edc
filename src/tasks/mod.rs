//! Remote job tracking: submission of recorded cycles and collection of
//! finished results.

pub mod api;
pub mod registry;

pub use api::{HttpJobApi, JobApi, JobResult, JobStatus, JobSubmission, SubmissionError, TaskId};
pub use registry::{TaskRecord, TaskRegistry, TaskStatus};

#[cfg(test)]
pub use api::MockJobApi;
