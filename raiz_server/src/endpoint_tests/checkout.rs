use std::sync::Arc;

use actix_web::{http::StatusCode, test::TestRequest};
use mockall::predicate;
use raiz_engine::{
    api::order_objects::NewOrderRequest,
    db_types::{JobQueueName, OrderStatusType},
    events::EventProducers,
    traits::{CheckoutRequest, CheckoutSession, GatewayError, JobQueue, MockPaymentGateway, OrderManagement, WebhookEvent},
    OrderFlowApi,
};
use serde_json::json;

use super::helpers::{bearer, parse, TestBackend};
use crate::data_objects::StatusResponse;

const GOOD_SIGNATURE: &str = "t=1700000000,v1=good";

async fn pending_order(backend: &TestBackend, user_id: i64) -> i64 {
    let api = OrderFlowApi::new(backend.db().clone(), EventProducers::default());
    api.create_order(user_id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap().id
}

fn checkout_gateway() -> MockPaymentGateway {
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_create_checkout_session()
        .withf(|req| req.price.value() == 9900 && req.description.contains("Maria Silva"))
        .times(1)
        .returning(|req| {
            Ok(CheckoutSession {
                id: format!("cs_test_{}", req.order_id),
                url: format!("https://checkout.stripe.com/c/pay/cs_test_{}", req.order_id),
            })
        });
    gateway
}

/// A gateway that accepts only [`GOOD_SIGNATURE`] and reads the order id from a tiny JSON payload.
fn webhook_gateway() -> MockPaymentGateway {
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_verify_webhook().returning(|payload, signature| {
        if signature != GOOD_SIGNATURE {
            return Err(GatewayError::InvalidSignature("No signatures found matching the expected signature".into()));
        }
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| GatewayError::InvalidSignature(e.to_string()))?;
        Ok(WebhookEvent {
            event_type: value["type"].as_str().unwrap_or_default().to_string(),
            order_reference: value["order_id"].as_str().map(String::from),
        })
    });
    gateway
}

fn webhook(event_type: &str, order_id: &str, signature: &str) -> TestRequest {
    let body = json!({"type": event_type, "order_id": order_id}).to_string();
    TestRequest::post().uri("/webhooks/stripe").insert_header(("Stripe-Signature", signature)).set_payload(body)
}

#[actix_web::test]
async fn create_checkout_session() {
    let backend = TestBackend::with_gateway(Arc::new(checkout_gateway())).await;
    let (user_id, token) = backend.user("ana@example.com").await;
    let order_id = pending_order(&backend, user_id).await;

    let req = TestRequest::post()
        .uri("/checkout/create-session")
        .insert_header(bearer(&token))
        .set_json(json!({ "order_id": order_id }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let session: CheckoutSession = parse(&body);
    assert_eq!(session.id, format!("cs_test_{order_id}"));
    assert!(session.url.starts_with("https://checkout.stripe.com/"));

    let order = backend.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.stripe_session_id, Some(session.id));
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    backend.tear_down().await;
}

#[actix_web::test]
async fn checkout_of_someone_elses_order() {
    // The gateway must never be called
    let backend = TestBackend::new().await;
    let (ana, _) = backend.user("ana@example.com").await;
    let (_, bia_token) = backend.user("bia@example.com").await;
    let order_id = pending_order(&backend, ana).await;
    let req = TestRequest::post()
        .uri("/checkout/create-session")
        .insert_header(bearer(&bia_token))
        .set_json(json!({ "order_id": order_id }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    backend.tear_down().await;
}

#[actix_web::test]
async fn checkout_of_a_paid_order() {
    let backend = TestBackend::new().await;
    let (user_id, token) = backend.user("ana@example.com").await;
    let order_id = pending_order(&backend, user_id).await;
    OrderFlowApi::new(backend.db().clone(), EventProducers::default()).confirm_payment(order_id).await.unwrap();
    let req = TestRequest::post()
        .uri("/checkout/create-session")
        .insert_header(bearer(&token))
        .set_json(json!({ "order_id": order_id }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("PROCESSING"), "{body}");
    let order = backend.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.stripe_session_id, None);
    backend.tear_down().await;
}

#[actix_web::test]
async fn checkout_provider_failure() {
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_create_checkout_session()
        .with(predicate::function(|req: &CheckoutRequest| req.order_id > 0))
        .times(1)
        .returning(|_| Err(GatewayError::Provider("Stripe is down".into())));
    let backend = TestBackend::with_gateway(Arc::new(gateway)).await;
    let (user_id, token) = backend.user("ana@example.com").await;
    let order_id = pending_order(&backend, user_id).await;
    let req = TestRequest::post()
        .uri("/checkout/create-session")
        .insert_header(bearer(&token))
        .set_json(json!({ "order_id": order_id }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Stripe is down"));
    let order = backend.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    assert_eq!(order.stripe_session_id, None);
    backend.tear_down().await;
}

#[actix_web::test]
async fn payment_webhook_starts_the_search_once() {
    let backend = TestBackend::with_gateway(Arc::new(webhook_gateway())).await;
    let (user_id, _) = backend.user("ana@example.com").await;
    let order_id = pending_order(&backend, user_id).await;
    let expected = serde_json::to_string(&StatusResponse::success()).unwrap();

    for _ in 0..3 {
        let req = webhook("checkout.session.completed", &order_id.to_string(), GOOD_SIGNATURE);
        let (status, body) = backend.send(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, expected);
    }
    let order = backend.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Processing);
    let searches = backend.db().fetch_jobs(JobQueueName::Search).await.unwrap();
    assert_eq!(searches.len(), 1);
    // Welcome email and one "search started" email
    let emails = backend.db().fetch_jobs(JobQueueName::Email).await.unwrap();
    assert_eq!(emails.len(), 2);
    backend.tear_down().await;
}

#[actix_web::test]
async fn rejected_webhooks_change_nothing() {
    let backend = TestBackend::with_gateway(Arc::new(webhook_gateway())).await;
    let (user_id, _) = backend.user("ana@example.com").await;
    let order_id = pending_order(&backend, user_id).await;
    let id = order_id.to_string();

    let (status, body) = backend.send(webhook("checkout.session.completed", &id, "t=1,v1=forged")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid payment provider signature"));

    let req = TestRequest::post().uri("/webhooks/stripe").set_payload(r#"{"type":"checkout.session.completed"}"#);
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Missing Stripe-Signature header"));

    let (status, _) = backend.send(webhook("checkout.session.completed", "abc", GOOD_SIGNATURE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = backend.send(webhook("checkout.session.completed", "987654", GOOD_SIGNATURE)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Other event types are acknowledged and ignored
    let (status, _) = backend.send(webhook("payment_intent.created", &id, GOOD_SIGNATURE)).await;
    assert_eq!(status, StatusCode::OK);

    let order = backend.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    assert!(backend.db().fetch_jobs(JobQueueName::Search).await.unwrap().is_empty());
    backend.tear_down().await;
}
