use thiserror::Error;

use crate::{
    db_types::{NewSearchOrder, NewSearchResult, SearchOrder, SearchResult},
    traits::{JobQueueError, UserStoreError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order #{0} does not exist")]
    OrderNotFound(i64),
    #[error("User #{0} does not exist")]
    UserNotFound(i64),
    #[error("Checkout session {0} is already attached to another order")]
    DuplicateSession(String),
    #[error("Could not enqueue follow-up job: {0}")]
    JobError(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}

impl From<JobQueueError> for OrderStoreError {
    fn from(e: JobQueueError) -> Self {
        OrderStoreError::JobError(e.to_string())
    }
}

impl From<UserStoreError> for OrderStoreError {
    fn from(e: UserStoreError) -> Self {
        match e {
            UserStoreError::UserNotFound(id) => OrderStoreError::UserNotFound(id),
            e => OrderStoreError::DatabaseError(e.to_string()),
        }
    }
}

/// Storage and retrieval of search orders and their results.
///
/// Status changes are deliberately absent from this trait. They are performed by [`super::OrderLifecycleDatabase`]
/// so that each transition happens together with its side effects.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Inserts a new order with status `PENDING_PAYMENT`.
    async fn insert_order(&self, order: NewSearchOrder) -> Result<SearchOrder, OrderStoreError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<SearchOrder>, OrderStoreError>;

    /// All orders for the user, newest first.
    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<SearchOrder>, OrderStoreError>;

    /// All results for the order, in insertion order.
    async fn fetch_results_for_order(&self, order_id: i64) -> Result<Vec<SearchResult>, OrderStoreError>;

    /// All results for every order belonging to the user, in insertion order.
    async fn fetch_results_for_user(&self, user_id: i64) -> Result<Vec<SearchResult>, OrderStoreError>;

    /// Appends a single result. Fails with [`OrderStoreError::OrderNotFound`] if the order does not exist.
    async fn insert_result(&self, result: NewSearchResult) -> Result<SearchResult, OrderStoreError>;
}
