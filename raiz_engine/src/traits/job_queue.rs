use std::time::Duration;

use thiserror::Error;

use crate::db_types::{Job, JobPayload, JobQueueName, JobRecord};

#[derive(Debug, Clone, Error)]
pub enum JobQueueError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Could not encode or decode job payload: {0}")]
    PayloadError(String),
    #[error("Job #{0} does not exist")]
    JobNotFound(i64),
}

impl From<sqlx::Error> for JobQueueError {
    fn from(e: sqlx::Error) -> Self {
        JobQueueError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for JobQueueError {
    fn from(e: serde_json::Error) -> Self {
        JobQueueError::PayloadError(e.to_string())
    }
}

/// A durable, at-least-once work queue.
///
/// Claimed jobs are leased to the worker that claimed them. If the worker neither completes nor fails the job before
/// the lease runs out, the job becomes claimable again. Consumers must therefore be idempotent.
#[allow(async_fn_in_trait)]
pub trait JobQueue {
    /// Adds a job to the queue named by [`JobPayload::queue`], returning the job id.
    async fn enqueue_job(&self, payload: JobPayload) -> Result<i64, JobQueueError>;

    /// Claims the oldest runnable job on the given queue, if there is one.
    async fn claim_job(&self, queue: JobQueueName, lease: Duration) -> Result<Option<Job>, JobQueueError>;

    async fn complete_job(&self, job_id: i64) -> Result<(), JobQueueError>;

    /// Records a failed attempt. If `retry_in` is `Some` and the job has attempts left, it is rescheduled, otherwise
    /// it is marked as permanently failed.
    async fn fail_job(&self, job_id: i64, error: &str, retry_in: Option<Duration>) -> Result<(), JobQueueError>;

    /// Returns every job ever placed on the queue, oldest first.
    async fn fetch_jobs(&self, queue: JobQueueName) -> Result<Vec<JobRecord>, JobQueueError>;
}
