use actix_web::{http::StatusCode, test::TestRequest};
use raiz_common::Cents;
use raiz_engine::{api::order_objects::OrderWithResults, db_types::OrderStatusType};
use serde_json::json;

use super::helpers::{bearer, parse, TestBackend};

fn new_order(name: &str) -> serde_json::Value {
    json!({
        "target_name": name,
        "order_price": 99.0,
        "target_city": "Campinas",
        "target_state": "SP",
        "additional_info": "  "
    })
}

#[actix_web::test]
async fn create_and_fetch_orders() {
    let backend = TestBackend::new().await;
    let (_, token) = backend.user("ana@example.com").await;

    let req = TestRequest::post().uri("/orders").insert_header(bearer(&token)).set_json(new_order("Maria Silva"));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::CREATED);
    let first: OrderWithResults = parse(&body);
    assert_eq!(first.status, OrderStatusType::PendingPayment);
    assert_eq!(first.order_price, Cents::from(9900));
    assert_eq!(first.target_city.as_deref(), Some("Campinas"));
    assert_eq!(first.additional_info, None);
    assert_eq!(first.completed_at, None);
    assert!(first.results.is_empty());

    let req = TestRequest::post().uri("/orders").insert_header(bearer(&token)).set_json(new_order("João Silva"));
    let (_, body) = backend.send(req).await;
    let second: OrderWithResults = parse(&body);

    let (status, body) = backend.send(TestRequest::get().uri("/orders").insert_header(bearer(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<OrderWithResults> = parse(&body);
    let ids = orders.iter().map(|o| o.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![second.id, first.id], "orders should be newest first");

    let req = TestRequest::get().uri(&format!("/orders/{}", first.id)).insert_header(bearer(&token));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<OrderWithResults>(&body).target_name, "Maria Silva");
    backend.tear_down().await;
}

#[actix_web::test]
async fn other_peoples_orders_are_not_found() {
    let backend = TestBackend::new().await;
    let (_, ana) = backend.user("ana@example.com").await;
    let (_, bia) = backend.user("bia@example.com").await;
    let req = TestRequest::post().uri("/orders").insert_header(bearer(&ana)).set_json(new_order("Maria Silva"));
    let (_, body) = backend.send(req).await;
    let order: OrderWithResults = parse(&body);

    let req = TestRequest::get().uri(&format!("/orders/{}", order.id)).insert_header(bearer(&bia));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, format!(r#"{{"error":"Order #{} not found"}}"#, order.id));

    let (status, body) = backend.send(TestRequest::get().uri("/orders").insert_header(bearer(&bia))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");

    let (status, _) = backend.send(TestRequest::get().uri("/orders/4242").insert_header(bearer(&ana))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    backend.tear_down().await;
}

#[actix_web::test]
async fn invalid_orders_are_rejected() {
    let backend = TestBackend::new().await;
    let (_, token) = backend.user("ana@example.com").await;
    for body in [
        json!({"target_name": "  ", "order_price": 99.0}),
        json!({"target_name": "Maria", "order_price": 0.0}),
        json!({"target_name": "Maria", "order_price": -10.0}),
        json!({"target_name": "Maria"}),
        json!({"order_price": 99.0}),
    ] {
        let req = TestRequest::post().uri("/orders").insert_header(bearer(&token)).set_json(&body);
        let (status, response) = backend.send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} should have been rejected");
        assert!(response.starts_with(r#"{"error":"#));
    }
    let req = TestRequest::post().uri("/orders").set_json(new_order("Maria Silva"));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    backend.tear_down().await;
}
