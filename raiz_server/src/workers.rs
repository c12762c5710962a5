//! Background job consumers.
//!
//! The search workers and the mail worker drain the durable job queue. Each worker polls its queue on a timer and can
//! also be woken early through a shared [`Notify`], which the server pokes whenever an order starts processing.
use std::{sync::Arc, time::Duration};

use log::*;
use raiz_engine::{
    db_types::{Job, JobPayload, JobQueueName},
    search::SearchOrchestrator,
    traits::{JobQueue, JobQueueError},
    SqliteDatabase,
};
use tokio::{sync::Notify, task::JoinHandle};

use crate::{config::WorkerConfig, integrations::Mailer};

const BASE_RETRY_DELAY: Duration = Duration::from_secs(15);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(15 * 60);
const MAIL_LEASE: Duration = Duration::from_secs(120);

/// Exponential backoff for the next attempt, after `attempts` attempts have been made.
pub fn retry_delay(attempts: i64) -> Duration {
    let exp = u32::try_from(attempts.clamp(1, 16) - 1).unwrap_or(0);
    BASE_RETRY_DELAY.saturating_mul(2u32.saturating_pow(exp)).min(MAX_RETRY_DELAY)
}

/// A search job may run for as long as its slowest source, so the lease must outlast the source timeout.
pub fn search_lease(source_timeout: Duration) -> Duration {
    source_timeout.saturating_mul(2) + Duration::from_secs(60)
}

/// Starts the search workers. Do not await the returned JoinHandles, as they run indefinitely.
pub fn start_search_workers(
    db: SqliteDatabase,
    orchestrator: Arc<SearchOrchestrator<SqliteDatabase>>,
    config: &WorkerConfig,
    wake: Arc<Notify>,
) -> Vec<JoinHandle<()>> {
    let lease = search_lease(config.source_timeout);
    (0..config.search_workers)
        .map(|n| {
            let db = db.clone();
            let orchestrator = Arc::clone(&orchestrator);
            let wake = Arc::clone(&wake);
            let poll = config.poll_interval;
            tokio::spawn(async move {
                info!("🕰️ Search worker {n} started");
                loop {
                    match run_next_search(&db, &orchestrator, lease).await {
                        // There may be more work waiting
                        Ok(true) => continue,
                        Ok(false) => {},
                        Err(e) => error!("🕰️ Search worker {n} could not read the job queue. {e}"),
                    }
                    idle(poll, &wake).await;
                }
            })
        })
        .collect()
}

/// Starts the mail worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_mail_worker(db: SqliteDatabase, mailer: Mailer, poll: Duration, wake: Arc<Notify>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🕰️ Mail worker started. Sending as {}", mailer.sender());
        loop {
            match run_next_email(&db, &mailer).await {
                Ok(true) => continue,
                Ok(false) => {},
                Err(e) => error!("🕰️ Mail worker could not read the job queue. {e}"),
            }
            idle(poll, &wake).await;
        }
    })
}

async fn idle(poll: Duration, wake: &Notify) {
    tokio::select! {
        _ = tokio::time::sleep(poll) => {},
        _ = wake.notified() => trace!("🕰️ Worker woken early"),
    }
}

/// Claims and runs one search job. Returns `false` if the queue was empty.
pub async fn run_next_search(
    db: &SqliteDatabase,
    orchestrator: &SearchOrchestrator<SqliteDatabase>,
    lease: Duration,
) -> Result<bool, JobQueueError> {
    let Some(job) = db.claim_job(JobQueueName::Search, lease).await? else {
        return Ok(false);
    };
    let JobPayload::RunSearch { order_id } = job.payload else {
        warn!("🕰️ Job #{} on the search queue is not a search. Discarding it", job.id);
        db.fail_job(job.id, "Unexpected payload on the search queue", None).await?;
        return Ok(true);
    };
    debug!("🕰️ Running search job #{} for order #{order_id} (attempt {}/{})", job.id, job.attempts, job.max_attempts);
    match orchestrator.process_order(order_id).await {
        Ok(Some(order)) => {
            info!("🕰️ Search job #{} finished. Order #{order_id} is {}", job.id, order.status);
            db.complete_job(job.id).await?;
        },
        Ok(None) => db.complete_job(job.id).await?,
        Err(e) => {
            warn!("🕰️ Search job #{} for order #{order_id} failed. {e}", job.id);
            retry_later(db, &job, &e.to_string()).await?;
        },
    }
    Ok(true)
}

/// Claims and delivers one email. Returns `false` if the queue was empty.
///
/// Delivery failures are retried. They never affect the order that caused the email.
pub async fn run_next_email(db: &SqliteDatabase, mailer: &Mailer) -> Result<bool, JobQueueError> {
    let Some(job) = db.claim_job(JobQueueName::Email, MAIL_LEASE).await? else {
        return Ok(false);
    };
    let JobPayload::SendEmail(message) = &job.payload else {
        warn!("🕰️ Job #{} on the email queue is not an email. Discarding it", job.id);
        db.fail_job(job.id, "Unexpected payload on the email queue", None).await?;
        return Ok(true);
    };
    match mailer.send(message).await {
        Ok(()) => {
            debug!("🕰️📧️ Email job #{} sent to {}", job.id, message.to_email);
            db.complete_job(job.id).await?;
        },
        Err(e) => {
            warn!("🕰️📧️ Could not send '{}' (job #{}). {e}", message.subject, job.id);
            retry_later(db, &job, &e.to_string()).await?;
        },
    }
    Ok(true)
}

async fn retry_later(db: &SqliteDatabase, job: &Job, error: &str) -> Result<(), JobQueueError> {
    if job.is_last_attempt() {
        error!("🕰️ Job #{} has failed {} times and will not be retried. {error}", job.id, job.attempts);
    }
    db.fail_job(job.id, error, Some(retry_delay(job.attempts))).await
}
