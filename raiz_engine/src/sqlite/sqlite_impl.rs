//! `SqliteDatabase` is a concrete implementation of an order engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the
//! [`crate::traits`] module.
use std::{fmt::Debug, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{jobs, new_pool, orders, reset_tokens, results, users};
use crate::{
    db_types::{
        Job,
        JobPayload,
        JobQueueName,
        JobRecord,
        NewSearchOrder,
        NewSearchResult,
        NewUser,
        OrderStatusType,
        PasswordResetToken,
        SearchOrder,
        SearchResult,
        User,
        UserUpdate,
    },
    traits::{
        AuthManagement,
        JobQueue,
        JobQueueError,
        OrderLifecycleDatabase,
        OrderManagement,
        OrderStoreError,
        UserManagement,
        UserStoreError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl OrderLifecycleDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn attach_checkout_session(
        &self,
        order_id: i64,
        session_id: &str,
    ) -> Result<Option<SearchOrder>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::set_session_if_pending(order_id, session_id, &mut conn).await?;
        if order.is_some() {
            debug!("🗃️ Checkout session {session_id} attached to order #{order_id}");
        }
        Ok(order)
    }

    /// Takes a paid order, and in a single atomic transaction,
    /// * moves the order from `PENDING_PAYMENT` to `PROCESSING`. If the order is in any other state, nothing further
    ///   is done.
    /// * enqueues the jobs produced by `follow_up`, typically the search itself and the "search started" email.
    async fn start_processing<F>(&self, order_id: i64, follow_up: F) -> Result<Option<SearchOrder>, OrderStoreError>
    where F: FnOnce(&SearchOrder, &User) -> Vec<JobPayload> + Send {
        let mut tx = self.pool.begin().await?;
        let from = OrderStatusType::PendingPayment;
        let order = orders::transition_status(order_id, from, OrderStatusType::Processing, &mut tx).await?;
        let Some(order) = order else {
            tx.rollback().await?;
            return Ok(None);
        };
        let user = users::fetch_user_by_id(order.user_id, &mut tx)
            .await?
            .ok_or(OrderStoreError::UserNotFound(order.user_id))?;
        for job in follow_up(&order, &user) {
            jobs::enqueue(&job, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(Some(order))
    }

    /// Takes an order whose search has finished, and in a single atomic transaction,
    /// * stores the results of the search, once the order is known to still be `PROCESSING`.
    /// * determines the outcome from the stored results: success if at least one result is `FOUND`.
    /// * moves the order from `PROCESSING` to the terminal status and stamps `completed_at`.
    /// * enqueues the jobs produced by `follow_up`, typically the result email.
    async fn complete_processing<F>(
        &self,
        order_id: i64,
        new_results: Vec<NewSearchResult>,
        follow_up: F,
    ) -> Result<Option<SearchOrder>, OrderStoreError>
    where
        F: FnOnce(&SearchOrder, &User) -> Vec<JobPayload> + Send,
    {
        let mut tx = self.pool.begin().await?;
        // Write first, so that the transaction holds the write lock before the results are read.
        let touched = sqlx::query("UPDATE search_orders SET updated_at = updated_at WHERE id = $1 AND status = $2")
            .bind(order_id)
            .bind(OrderStatusType::Processing)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        let count = new_results.len();
        for mut result in new_results {
            result.order_id = order_id;
            results::insert_result(result, &mut tx).await?;
        }
        debug!("🗃️ {count} results stored for order #{order_id}");
        let outcome = if results::has_found_result(order_id, &mut tx).await? {
            OrderStatusType::CompletedSuccess
        } else {
            OrderStatusType::CompletedFailure
        };
        let order = orders::transition_status(order_id, OrderStatusType::Processing, outcome, &mut tx).await?;
        let Some(order) = order else {
            tx.rollback().await?;
            return Ok(None);
        };
        let user = users::fetch_user_by_id(order.user_id, &mut tx)
            .await?
            .ok_or(OrderStoreError::UserNotFound(order.user_id))?;
        for job in follow_up(&order, &user) {
            jobs::enqueue(&job, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(Some(order))
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewSearchOrder) -> Result<SearchOrder, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<SearchOrder>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<SearchOrder>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_results_for_order(&self, order_id: i64) -> Result<Vec<SearchResult>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let results = results::fetch_results_for_order(order_id, &mut conn).await?;
        Ok(results)
    }

    async fn fetch_results_for_user(&self, user_id: i64) -> Result<Vec<SearchResult>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let results = results::fetch_results_for_user(user_id, &mut conn).await?;
        Ok(results)
    }

    async fn insert_result(&self, result: NewSearchResult) -> Result<SearchResult, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = results::insert_result(result, &mut conn).await?;
        debug!("🗃️ Result #{} ({}) stored for order #{}", result.id, result.status, result.order_id);
        Ok(result)
    }
}

impl UserManagement for SqliteDatabase {
    async fn create_user(&self, user: NewUser) -> Result<User, UserStoreError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::insert_user(user, &mut conn).await?;
        debug!("🗃️ User #{} created", user.id);
        Ok(user)
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, UserStoreError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_id(user_id, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_email(email, &mut conn).await?;
        Ok(user)
    }

    async fn update_user(&self, user_id: i64, update: UserUpdate) -> Result<User, UserStoreError> {
        let mut conn = self.pool.acquire().await?;
        users::update_user(user_id, update, &mut conn).await
    }
}

impl AuthManagement for SqliteDatabase {
    async fn replace_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, UserStoreError> {
        let mut tx = self.pool.begin().await?;
        let removed = reset_tokens::delete_tokens_for_user(user_id, &mut tx).await?;
        if removed > 0 {
            trace!("🗃️ {removed} earlier reset tokens for user #{user_id} invalidated");
        }
        let token = reset_tokens::insert_token(user_id, token, expires_at, &mut tx).await?;
        tx.commit().await?;
        Ok(token)
    }

    async fn fetch_reset_token(&self, token: &str) -> Result<Option<PasswordResetToken>, UserStoreError> {
        let mut conn = self.pool.acquire().await?;
        let token = reset_tokens::fetch_token(token, &mut conn).await?;
        Ok(token)
    }

    async fn delete_reset_token(&self, token_id: i64) -> Result<(), UserStoreError> {
        let mut conn = self.pool.acquire().await?;
        reset_tokens::take_token_by_id(token_id, &mut conn).await?;
        Ok(())
    }

    async fn reset_password_with_token(&self, token_id: i64, password_hash: &str) -> Result<bool, UserStoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(token) = reset_tokens::take_token_by_id(token_id, &mut tx).await? else {
            tx.rollback().await?;
            return Ok(false);
        };
        let update = UserUpdate { password_hash: Some(password_hash.to_string()), ..Default::default() };
        users::update_user(token.user_id, update, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Password for user #{} reset", token.user_id);
        Ok(true)
    }
}

impl JobQueue for SqliteDatabase {
    async fn enqueue_job(&self, payload: JobPayload) -> Result<i64, JobQueueError> {
        let mut conn = self.pool.acquire().await?;
        jobs::enqueue(&payload, &mut conn).await
    }

    async fn claim_job(&self, queue: JobQueueName, lease: Duration) -> Result<Option<Job>, JobQueueError> {
        let mut tx = self.pool.begin().await?;
        jobs::fail_abandoned(queue, &mut tx).await?;
        let record = jobs::claim(queue, lease, &mut tx).await?;
        tx.commit().await?;
        let Some(record) = record else {
            return Ok(None);
        };
        match serde_json::from_str::<JobPayload>(&record.payload) {
            Ok(payload) => {
                Ok(Some(Job { id: record.id, attempts: record.attempts, max_attempts: record.max_attempts, payload }))
            },
            Err(e) => {
                error!("🗃️ Job #{} has an unreadable payload and will not be retried: {e}", record.id);
                let mut conn = self.pool.acquire().await?;
                jobs::mark_failed(record.id, &format!("Unreadable payload: {e}"), None, &mut conn).await?;
                Err(e.into())
            },
        }
    }

    async fn complete_job(&self, job_id: i64) -> Result<(), JobQueueError> {
        let mut conn = self.pool.acquire().await?;
        jobs::mark_done(job_id, &mut conn).await
    }

    async fn fail_job(&self, job_id: i64, error: &str, retry_in: Option<Duration>) -> Result<(), JobQueueError> {
        let mut tx = self.pool.begin().await?;
        jobs::mark_failed(job_id, error, retry_in, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_jobs(&self, queue: JobQueueName) -> Result<Vec<JobRecord>, JobQueueError> {
        let mut conn = self.pool.acquire().await?;
        let jobs = jobs::fetch_jobs(queue, &mut conn).await?;
        Ok(jobs)
    }
}
