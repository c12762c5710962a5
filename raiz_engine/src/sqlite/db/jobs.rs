use std::time::Duration;

use chrono::Utc;
use log::{debug, trace, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::{JobPayload, JobQueueName, JobRecord, JobStatus},
    traits::JobQueueError,
};

pub const DEFAULT_MAX_ATTEMPTS: i64 = 5;

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Inserts a job that is immediately runnable. This is not atomic on its own; pass `&mut *tx` to enqueue a job as
/// part of a larger transaction.
pub async fn enqueue(payload: &JobPayload, conn: &mut SqliteConnection) -> Result<i64, JobQueueError> {
    let json = serde_json::to_string(payload)?;
    let now = Utc::now();
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO jobs (queue, payload, status, attempts, max_attempts, run_after, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5, $6, $6)
            RETURNING id;
        "#,
    )
    .bind(payload.queue())
    .bind(json)
    .bind(JobStatus::Pending)
    .bind(DEFAULT_MAX_ATTEMPTS)
    .bind(now.timestamp_millis())
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Job #{id} queued on '{}'", payload.queue());
    Ok(id)
}

/// Marks jobs whose lease has run out on their final attempt as failed, so they do not stay `RUNNING` forever.
pub async fn fail_abandoned(queue: JobQueueName, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
            UPDATE jobs SET status = $1, locked_until = NULL, last_error = 'Lease expired on final attempt',
                updated_at = $2
            WHERE queue = $3 AND status = $4 AND locked_until < $5 AND attempts >= max_attempts
        "#,
    )
    .bind(JobStatus::Failed)
    .bind(now)
    .bind(queue)
    .bind(JobStatus::Running)
    .bind(now.timestamp_millis())
    .execute(conn)
    .await?;
    if result.rows_affected() > 0 {
        warn!("🗃️ {} abandoned jobs on '{queue}' marked as failed", result.rows_affected());
    }
    Ok(result.rows_affected())
}

/// Claims the next runnable job with a single `UPDATE ... RETURNING` statement.
///
/// A job is runnable if it is pending and due, or if it is running but its lease has expired.
pub async fn claim(
    queue: JobQueueName,
    lease: Duration,
    conn: &mut SqliteConnection,
) -> Result<Option<JobRecord>, sqlx::Error> {
    let now = Utc::now();
    let now_ms = now.timestamp_millis();
    sqlx::query_as(
        r#"
            UPDATE jobs SET status = $1, attempts = attempts + 1, locked_until = $2, updated_at = $3
            WHERE id = (
                SELECT id FROM jobs
                WHERE queue = $4 AND (
                    (status = $5 AND run_after <= $6) OR
                    (status = $1 AND locked_until < $6 AND attempts < max_attempts)
                )
                ORDER BY run_after ASC, id ASC
                LIMIT 1
            )
            RETURNING *;
        "#,
    )
    .bind(JobStatus::Running)
    .bind(now_ms.saturating_add(millis(lease)))
    .bind(now)
    .bind(queue)
    .bind(JobStatus::Pending)
    .bind(now_ms)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_job(id: i64, conn: &mut SqliteConnection) -> Result<Option<JobRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM jobs WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_jobs(queue: JobQueueName, conn: &mut SqliteConnection) -> Result<Vec<JobRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM jobs WHERE queue = $1 ORDER BY id ASC").bind(queue).fetch_all(conn).await
}

pub async fn mark_done(id: i64, conn: &mut SqliteConnection) -> Result<(), JobQueueError> {
    let result = sqlx::query("UPDATE jobs SET status = $1, locked_until = NULL, updated_at = $2 WHERE id = $3")
        .bind(JobStatus::Done)
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(JobQueueError::JobNotFound(id));
    }
    Ok(())
}

/// Records a failed attempt. The job is rescheduled `retry_in` from now if it has attempts left, and marked as
/// failed otherwise.
pub async fn mark_failed(
    id: i64,
    error: &str,
    retry_in: Option<Duration>,
    conn: &mut SqliteConnection,
) -> Result<(), JobQueueError> {
    let job = fetch_job(id, conn).await?.ok_or(JobQueueError::JobNotFound(id))?;
    let now = Utc::now();
    let (status, run_after) = match retry_in {
        Some(delay) if job.attempts < job.max_attempts => {
            (JobStatus::Pending, now.timestamp_millis().saturating_add(millis(delay)))
        },
        _ => (JobStatus::Failed, job.run_after),
    };
    sqlx::query(
        r#"
            UPDATE jobs SET status = $1, run_after = $2, locked_until = NULL, last_error = $3, updated_at = $4
            WHERE id = $5
        "#,
    )
    .bind(status)
    .bind(run_after)
    .bind(error)
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    debug!("🗃️ Job #{id} attempt {}/{} failed. Job is now {status:?}", job.attempts, job.max_attempts);
    Ok(())
}
