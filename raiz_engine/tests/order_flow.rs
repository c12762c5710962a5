use std::{sync::Arc, time::Duration};

use raiz_common::Cents;
use raiz_engine::{
    db_types::{JobPayload, JobQueueName, NewSearchResult, OrderStatusType, ResultStatus},
    events::EventProducers,
    notifications::{SUBJECT_SEARCH_RESULT, SUBJECT_SEARCH_STARTED},
    order_objects::{NewOrderRequest, PaymentConfirmation, SearchResultSubmission},
    search::{CannedSource, SearchSource, SourceOutcome},
    traits::{JobQueue, OrderManagement},
    OrderFlowApi,
    OrderFlowError,
    SearchOrchestrator,
    SqliteDatabase,
};
use support::{
    prepare_env::{create_user, prepare_test_env, tear_down},
    stub_gateway::{completed_event, StubGateway, GOOD_SIGNATURE},
};

mod support;

fn sources() -> Vec<Arc<dyn SearchSource>> {
    let found = serde_json::json!({"cartorio": "1º Ofício de Registro Civil", "livro": "A-12", "folha": "34"});
    vec![
        Arc::new(CannedSource::new("Registry A", Duration::from_millis(10), SourceOutcome::found(found))),
        Arc::new(CannedSource::new("Registry B", Duration::from_millis(10), SourceOutcome::not_found())),
        Arc::new(CannedSource::new("Registry C", Duration::from_millis(10), SourceOutcome::not_found())),
    ]
}

async fn emails_with_subject(db: &SqliteDatabase, subject: &str) -> usize {
    db.fetch_jobs(JobQueueName::Email)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|j| serde_json::from_str::<JobPayload>(&j.payload).ok())
        .filter(|p| matches!(p, JobPayload::SendEmail(m) if m.subject == subject))
        .count()
}

#[tokio::test]
async fn paid_order_is_searched_and_completed() {
    let db = prepare_test_env().await;
    let user = create_user(&db, "maria@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let gateway = StubGateway::default();

    let order = api.create_order(user.id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap();
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    assert_eq!(order.order_price, Cents::from(9900));
    assert!(order.completed_at.is_none());

    let session = api.begin_checkout(&gateway, order.id, Some(user.id)).await.unwrap();
    assert!(session.url.contains(&session.id));
    let request = gateway.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.price, Cents::from(9900));
    assert!(request.description.contains("Maria Silva"));
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.stripe_session_id.as_deref(), Some(session.id.as_str()));

    let confirmation = api.on_payment_confirmed(&gateway, &completed_event(order.id), GOOD_SIGNATURE).await.unwrap();
    assert!(matches!(confirmation, PaymentConfirmation::Started(ref o) if o.status == OrderStatusType::Processing));
    let search_jobs = db.fetch_jobs(JobQueueName::Search).await.unwrap();
    assert_eq!(search_jobs.len(), 1);
    assert_eq!(emails_with_subject(&db, SUBJECT_SEARCH_STARTED).await, 1);

    let orchestrator =
        SearchOrchestrator::new(db.clone(), EventProducers::default(), sources(), Duration::from_secs(5));
    let completed = orchestrator.process_order(order.id).await.unwrap().unwrap();
    assert_eq!(completed.status, OrderStatusType::CompletedSuccess);
    assert!(completed.completed_at.is_some());

    let results = db.fetch_results_for_order(order.id).await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().filter(|r| r.status == ResultStatus::Found).count(), 1);
    assert_eq!(emails_with_subject(&db, SUBJECT_SEARCH_RESULT).await, 1);

    // A redelivered search job does nothing
    assert!(orchestrator.process_order(order.id).await.unwrap().is_none());
    assert_eq!(db.fetch_results_for_order(order.id).await.unwrap().len(), 3);
    assert_eq!(emails_with_subject(&db, SUBJECT_SEARCH_RESULT).await, 1);
    tear_down(db).await;
}

#[tokio::test]
async fn search_with_no_hits_fails_the_order() {
    let db = prepare_test_env().await;
    let user = create_user(&db, "joao@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.create_order(user.id, NewOrderRequest::new("João Pereira", 49.9)).await.unwrap();
    api.confirm_payment(order.id).await.unwrap();
    let misses: Vec<Arc<dyn SearchSource>> =
        vec![Arc::new(CannedSource::new("Registry B", Duration::ZERO, SourceOutcome::unavailable("maintenance")))];
    let orchestrator = SearchOrchestrator::new(db.clone(), EventProducers::default(), misses, Duration::from_secs(5));
    let completed = orchestrator.process_order(order.id).await.unwrap().unwrap();
    assert_eq!(completed.status, OrderStatusType::CompletedFailure);
    assert!(completed.completed_at.is_some());
    tear_down(db).await;
}

#[tokio::test]
async fn overlapping_search_runs_store_one_set_of_results() {
    let db = prepare_test_env().await;
    let user = create_user(&db, "maria@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.create_order(user.id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap();
    api.confirm_payment(order.id).await.unwrap();

    let orchestrator =
        SearchOrchestrator::new(db.clone(), EventProducers::default(), sources(), Duration::from_secs(5));
    // e.g. a job redelivered after its lease expired while the first run was still going
    let (a, b) = tokio::join!(orchestrator.process_order(order.id), orchestrator.process_order(order.id));
    let completed = [a, b].into_iter().filter(|r| matches!(r, Ok(Some(_)))).count();
    assert_eq!(completed, 1);

    assert_eq!(db.fetch_results_for_order(order.id).await.unwrap().len(), 3);
    assert_eq!(emails_with_subject(&db, SUBJECT_SEARCH_RESULT).await, 1);
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::CompletedSuccess);
    tear_down(db).await;
}

#[tokio::test]
async fn duplicate_confirmations_are_harmless() {
    let db = prepare_test_env().await;
    let user = create_user(&db, "maria@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let gateway = StubGateway::default();
    let order = api.create_order(user.id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap();
    let payload = completed_event(order.id);

    let first = api.on_payment_confirmed(&gateway, &payload, GOOD_SIGNATURE).await.unwrap();
    assert!(matches!(first, PaymentConfirmation::Started(_)));
    let second = api.on_payment_confirmed(&gateway, &payload, GOOD_SIGNATURE).await.unwrap();
    assert_eq!(second, PaymentConfirmation::AlreadyProcessed(order.id));

    assert_eq!(db.fetch_jobs(JobQueueName::Search).await.unwrap().len(), 1);
    assert_eq!(emails_with_subject(&db, SUBJECT_SEARCH_STARTED).await, 1);
    tear_down(db).await;
}

#[tokio::test]
async fn concurrent_duplicate_confirmations_start_one_search() {
    let db = prepare_test_env().await;
    let user = create_user(&db, "maria@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.create_order(user.id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap();

    let tasks = (0..8)
        .map(|_| {
            let api = api.clone();
            tokio::spawn(async move { api.confirm_payment(order.id).await })
        })
        .collect::<Vec<_>>();
    let mut started = 0;
    for task in tasks {
        // SQLite may report a busy database under contention; that is a retryable error, never a second transition
        if let Ok(PaymentConfirmation::Started(_)) = task.await.unwrap() {
            started += 1;
        }
    }
    assert_eq!(started, 1);
    assert_eq!(db.fetch_jobs(JobQueueName::Search).await.unwrap().len(), 1);
    assert_eq!(emails_with_subject(&db, SUBJECT_SEARCH_STARTED).await, 1);
    tear_down(db).await;
}

#[tokio::test]
async fn bad_signatures_change_nothing() {
    let db = prepare_test_env().await;
    let user = create_user(&db, "maria@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let gateway = StubGateway::default();
    let order = api.create_order(user.id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap();

    let err = api.on_payment_confirmed(&gateway, &completed_event(order.id), "t=1,v1=forged").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidSignature(_)));
    let order = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    assert!(db.fetch_jobs(JobQueueName::Search).await.unwrap().is_empty());
    tear_down(db).await;
}

#[tokio::test]
async fn other_events_and_malformed_events() {
    let db = prepare_test_env().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let gateway = StubGateway::default();

    let refund = br#"{"type": "charge.refunded", "data": {"object": {}}}"#;
    let result = api.on_payment_confirmed(&gateway, refund, GOOD_SIGNATURE).await.unwrap();
    assert_eq!(result, PaymentConfirmation::Ignored("charge.refunded".into()));

    let no_id = br#"{"type": "checkout.session.completed", "data": {"object": {"metadata": {}}}}"#;
    let err = api.on_payment_confirmed(&gateway, no_id, GOOD_SIGNATURE).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::MalformedEvent(_)));

    let bad_id = br#"{"type": "checkout.session.completed", "data": {"object": {"metadata": {"order_id": "abc"}}}}"#;
    let err = api.on_payment_confirmed(&gateway, bad_id, GOOD_SIGNATURE).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::MalformedEvent(_)));

    let err = api.on_payment_confirmed(&gateway, &completed_event(999), GOOD_SIGNATURE).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::NotFound(999)));
    tear_down(db).await;
}

#[tokio::test]
async fn checkout_requires_a_pending_order_owned_by_the_requester() {
    let db = prepare_test_env().await;
    let maria = create_user(&db, "maria@example.com").await;
    let joao = create_user(&db, "joao@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let gateway = StubGateway::default();
    let order = api.create_order(maria.id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap();

    let err = api.begin_checkout(&gateway, order.id, Some(joao.id)).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::NotFound(_)));
    let err = api.begin_checkout(&gateway, 12345, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::NotFound(12345)));

    api.confirm_payment(order.id).await.unwrap();
    let err = api.begin_checkout(&gateway, order.id, Some(maria.id)).await.unwrap_err();
    assert!(
        matches!(err, OrderFlowError::InvalidState { status: OrderStatusType::Processing, .. }),
        "unexpected error {err:?}"
    );
    assert_eq!(gateway.sessions_created.load(std::sync::atomic::Ordering::SeqCst), 0);
    tear_down(db).await;
}

#[tokio::test]
async fn failed_checkout_leaves_order_untouched() {
    let db = prepare_test_env().await;
    let user = create_user(&db, "maria@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.create_order(user.id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap();
    let err = api.begin_checkout(&StubGateway::failing(), order.id, Some(user.id)).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::GatewayError(_)));
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::PendingPayment);
    assert!(stored.stripe_session_id.is_none());
    tear_down(db).await;
}

#[tokio::test]
async fn search_completion_requires_processing() {
    let db = prepare_test_env().await;
    let user = create_user(&db, "maria@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.create_order(user.id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap();
    let late = vec![NewSearchResult::error(order.id, "Registry A", "too early")];
    let err = api.on_search_complete(order.id, late).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidState { status: OrderStatusType::PendingPayment, .. }));
    assert_eq!(emails_with_subject(&db, SUBJECT_SEARCH_RESULT).await, 0);
    assert!(db.fetch_results_for_order(order.id).await.unwrap().is_empty());
    tear_down(db).await;
}

#[tokio::test]
async fn completed_at_tracks_terminal_status() {
    let db = prepare_test_env().await;
    let user = create_user(&db, "maria@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.create_order(user.id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap();
    // The schema refuses a terminal status without a completion time
    let res = sqlx::query("UPDATE search_orders SET status = 'COMPLETED_SUCCESS' WHERE id = $1")
        .bind(order.id)
        .execute(db.pool())
        .await;
    assert!(res.is_err());
    let res = sqlx::query("UPDATE search_orders SET completed_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(order.id)
        .execute(db.pool())
        .await;
    assert!(res.is_err());
    tear_down(db).await;
}

#[tokio::test]
async fn externally_submitted_results_count_towards_the_outcome() {
    let db = prepare_test_env().await;
    let user = create_user(&db, "maria@example.com").await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.create_order(user.id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap();
    api.confirm_payment(order.id).await.unwrap();

    let submission = SearchResultSubmission {
        order_id: order.id,
        source_name: "Robô Cartório".into(),
        status: ResultStatus::Found,
        found_data_json: Some(r#"{"livro": "B-3"}"#.into()),
        screenshot_path: Some("/screens/1.png".into()),
        details: None,
    };
    let stored = api.submit_result(submission.clone()).await.unwrap();
    assert_eq!(stored.order_id, order.id);
    assert_eq!(stored.status, ResultStatus::Found);

    let missing = SearchResultSubmission { order_id: 4242, ..submission };
    assert!(matches!(api.submit_result(missing).await.unwrap_err(), OrderFlowError::NotFound(4242)));

    let completed = api.on_search_complete(order.id, vec![]).await.unwrap();
    assert_eq!(completed.status, OrderStatusType::CompletedSuccess);
    tear_down(db).await;
}
