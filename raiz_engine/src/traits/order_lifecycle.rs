use crate::{
    db_types::{JobPayload, NewSearchResult, SearchOrder, User},
    traits::{JobQueue, OrderManagement, OrderStoreError, UserManagement},
};

/// This trait defines the highest level of behaviour for backends supporting the order engine.
///
/// Every method performs one lifecycle transition. The transition is guarded by a conditional update on the current
/// status, executed as the first write of a transaction, so that concurrent callers racing on the same order are
/// serialised and exactly one of them wins. Any jobs produced by the transition are enqueued in the same transaction,
/// so a job is never visible to a worker before the status change that produced it is committed.
#[allow(async_fn_in_trait)]
pub trait OrderLifecycleDatabase: Clone + OrderManagement + UserManagement + JobQueue {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores the checkout session id on the order, replacing any previous one.
    ///
    /// Only succeeds while the order is `PENDING_PAYMENT`. Returns `None` without changing anything otherwise.
    async fn attach_checkout_session(
        &self,
        order_id: i64,
        session_id: &str,
    ) -> Result<Option<SearchOrder>, OrderStoreError>;

    /// Moves the order from `PENDING_PAYMENT` to `PROCESSING` and enqueues the jobs produced by `follow_up`.
    ///
    /// Returns `Some(order)` if this call performed the transition, or `None` if the order was no longer
    /// `PENDING_PAYMENT` (in which case nothing is enqueued).
    async fn start_processing<F>(&self, order_id: i64, follow_up: F) -> Result<Option<SearchOrder>, OrderStoreError>
    where F: FnOnce(&SearchOrder, &User) -> Vec<JobPayload> + Send;

    /// Stores the search results, moves the order from `PROCESSING` to its terminal status and sets `completed_at`.
    ///
    /// The terminal status is `COMPLETED_SUCCESS` if at least one stored result for the order is `FOUND` and
    /// `COMPLETED_FAILURE` otherwise. Returns `None` if the order was not `PROCESSING`, in which case none of the
    /// results are stored.
    async fn complete_processing<F>(
        &self,
        order_id: i64,
        results: Vec<NewSearchResult>,
        follow_up: F,
    ) -> Result<Option<SearchOrder>, OrderStoreError>
    where
        F: FnOnce(&SearchOrder, &User) -> Vec<JobPayload> + Send;
}
