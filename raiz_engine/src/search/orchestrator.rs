use std::{fmt::Debug, sync::Arc, time::Duration};

use futures_util::future::join_all;
use log::*;
use thiserror::Error;

use crate::{
    api::{errors::OrderFlowError, order_flow_api::OrderFlowApi},
    db_types::{NewSearchResult, OrderStatusType, SearchOrder},
    events::EventProducers,
    search::SearchSource,
    traits::{OrderLifecycleDatabase, OrderStoreError},
};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Could not store search results: {0}")]
    StorageError(String),
    #[error("Could not complete the order: {0}")]
    LifecycleError(#[from] OrderFlowError),
}

impl From<OrderStoreError> for SearchError {
    fn from(e: OrderStoreError) -> Self {
        SearchError::StorageError(e.to_string())
    }
}

/// Runs every registered source for an order, stores the results and reports the outcome to the lifecycle
/// controller.
pub struct SearchOrchestrator<B> {
    db: B,
    flow: OrderFlowApi<B>,
    sources: Vec<Arc<dyn SearchSource>>,
    source_timeout: Duration,
}

impl<B> Debug for SearchOrchestrator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.sources.iter().map(|s| s.name()).collect::<Vec<_>>();
        write!(f, "SearchOrchestrator ({names:?}, timeout {:?})", self.source_timeout)
    }
}

impl<B> SearchOrchestrator<B>
where B: OrderLifecycleDatabase
{
    pub fn new(db: B, producers: EventProducers, sources: Vec<Arc<dyn SearchSource>>, timeout: Duration) -> Self {
        let flow = OrderFlowApi::new(db.clone(), producers);
        Self { db, flow, sources, source_timeout: timeout }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Job entry point. Runs the search for the order if, and only if, the order is `PROCESSING`.
    ///
    /// Returns the completed order, or `None` if there was nothing to do. Redelivered jobs for orders that have
    /// already completed therefore do nothing.
    pub async fn process_order(&self, order_id: i64) -> Result<Option<SearchOrder>, SearchError> {
        let Some(order) = self.db.fetch_order(order_id).await? else {
            warn!("🔎️ Order #{order_id} no longer exists. Search skipped");
            return Ok(None);
        };
        if order.status != OrderStatusType::Processing {
            info!("🔎️ Order #{order_id} is {}. Search skipped", order.status);
            return Ok(None);
        }
        let order = self.run(&order).await?;
        Ok(Some(order))
    }

    /// Runs every source for the order, then stores all results and completes the order in one transaction.
    ///
    /// If another run completed the order first, this run stores nothing and fails with an `InvalidState` error.
    pub async fn run(&self, order: &SearchOrder) -> Result<SearchOrder, SearchError> {
        let outcomes = self.execute(order).await;
        let order = self.flow.on_search_complete(order.id, outcomes).await?;
        Ok(order)
    }

    /// Queries every source concurrently and returns one result per source, in registration order.
    ///
    /// This never fails. A source that returns an error, panics or runs out of time produces an `ERROR` result
    /// describing the fault.
    pub async fn execute(&self, order: &SearchOrder) -> Vec<NewSearchResult> {
        info!("🔎️ Searching {} sources for order #{}", self.sources.len(), order.id);
        let order = Arc::new(order.clone());
        let searches = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let order = Arc::clone(&order);
            let timeout = self.source_timeout;
            async move {
                let name = source.name().to_string();
                let order_id = order.id;
                let task = tokio::spawn(async move { source.search(&order).await });
                let abort = task.abort_handle();
                match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(Ok(outcome))) => {
                        debug!("🔎️ {name} reported {} for order #{order_id}", outcome.status);
                        outcome.into_result(order_id, &name)
                    },
                    Ok(Ok(Err(e))) => {
                        warn!("🔎️ {name} failed for order #{order_id}. {e}");
                        NewSearchResult::error(order_id, name, e.to_string())
                    },
                    Ok(Err(e)) => {
                        error!("🔎️ {name} crashed while searching for order #{order_id}. {e}");
                        NewSearchResult::error(order_id, name, format!("Source crashed: {e}"))
                    },
                    Err(_) => {
                        abort.abort();
                        warn!("🔎️ {name} timed out after {timeout:?} for order #{order_id}");
                        NewSearchResult::error(order_id, name, format!("Source timed out after {timeout:?}"))
                    },
                }
            }
        });
        join_all(searches).await
    }
}

#[cfg(test)]
mod test {
    use async_trait::async_trait;
    use chrono::Utc;
    use raiz_common::Cents;

    use super::*;
    use crate::{
        db_types::ResultStatus,
        search::{CannedSource, SourceError, SourceOutcome},
        SqliteDatabase,
    };

    struct FailingSource;

    #[async_trait]
    impl SearchSource for FailingSource {
        fn name(&self) -> &str {
            "Failing"
        }

        async fn search(&self, _order: &SearchOrder) -> Result<SourceOutcome, SourceError> {
            Err(SourceError::Request("connection refused".into()))
        }
    }

    struct PanickingSource;

    #[async_trait]
    impl SearchSource for PanickingSource {
        fn name(&self) -> &str {
            "Panicking"
        }

        async fn search(&self, _order: &SearchOrder) -> Result<SourceOutcome, SourceError> {
            panic!("the robot fell over")
        }
    }

    fn order() -> SearchOrder {
        let now = Utc::now();
        SearchOrder {
            id: 42,
            user_id: 1,
            status: OrderStatusType::Processing,
            order_price: Cents::from(9900),
            target_name: "Maria Silva".into(),
            target_dob_approx: None,
            target_city: None,
            target_state: None,
            target_parents_names: None,
            additional_info: None,
            stripe_session_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    async fn orchestrator(sources: Vec<Arc<dyn SearchSource>>) -> SearchOrchestrator<SqliteDatabase> {
        // `execute` never touches the database, so an unmigrated in-memory pool is enough
        let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.unwrap();
        SearchOrchestrator::new(db, EventProducers::default(), sources, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn faults_become_error_results_in_registration_order() {
        let _ = env_logger::try_init();
        let slow = CannedSource::new("Slow", Duration::from_secs(30), SourceOutcome::not_found());
        let found = CannedSource::new("Quick", Duration::ZERO, SourceOutcome::found(serde_json::json!({"a": 1})));
        let sources: Vec<Arc<dyn SearchSource>> =
            vec![Arc::new(slow), Arc::new(FailingSource), Arc::new(PanickingSource), Arc::new(found)];
        let orchestrator = orchestrator(sources).await;
        let results = orchestrator.execute(&order()).await;
        assert_eq!(results.len(), 4);
        let names = results.iter().map(|r| r.source_name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Slow", "Failing", "Panicking", "Quick"]);
        let statuses = results.iter().map(|r| r.status).collect::<Vec<_>>();
        assert_eq!(statuses, vec![ResultStatus::Error, ResultStatus::Error, ResultStatus::Error, ResultStatus::Found]);
        assert!(results[0].details.as_ref().unwrap().contains("timed out"));
        assert!(results[1].details.as_ref().unwrap().contains("connection refused"));
        assert!(results[2].details.as_ref().unwrap().contains("crashed"));
        assert!(results.iter().all(|r| r.order_id == 42));
    }

    #[tokio::test]
    async fn sources_run_concurrently() {
        let sources: Vec<Arc<dyn SearchSource>> = (0..5)
            .map(|i| {
                Arc::new(CannedSource::new(format!("S{i}"), Duration::from_millis(100), SourceOutcome::not_found()))
                    as Arc<dyn SearchSource>
            })
            .collect();
        let orchestrator = orchestrator(sources).await;
        let start = std::time::Instant::now();
        let results = orchestrator.execute(&order()).await;
        assert_eq!(results.len(), 5);
        assert!(start.elapsed() < Duration::from_millis(450), "sources appear to have run one after another");
    }

    #[tokio::test]
    async fn no_sources_no_results() {
        let orchestrator = orchestrator(vec![]).await;
        assert!(orchestrator.execute(&order()).await.is_empty());
        assert_eq!(orchestrator.source_count(), 0);
    }
}
