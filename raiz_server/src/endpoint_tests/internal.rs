use actix_web::{http::StatusCode, test::TestRequest};
use raiz_engine::{
    api::order_objects::{NewOrderRequest, OrderWithResults},
    db_types::{OrderStatusType, ResultStatus},
    events::EventProducers,
    OrderFlowApi,
};
use serde_json::json;

use super::helpers::{bearer, parse, TestBackend, TEST_API_KEY};
use crate::middleware::API_KEY_HEADER;

fn submission(order_id: i64) -> serde_json::Value {
    json!({
        "order_id": order_id,
        "source_name": "Robô Cartório SP",
        "status": "FOUND",
        "found_data_json": "{\"livro\":\"A-12\"}",
        "screenshot_path": "/shots/1.png"
    })
}

#[actix_web::test]
async fn robots_need_the_api_key() {
    let backend = TestBackend::new().await;
    let (user_id, _) = backend.user("ana@example.com").await;
    let api = OrderFlowApi::new(backend.db().clone(), EventProducers::default());
    let order_id = api.create_order(user_id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap().id;

    let req = TestRequest::post().uri("/internal/search_results").set_json(submission(order_id));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Invalid API key"}"#);

    let req = TestRequest::post()
        .uri("/internal/search_results")
        .insert_header((API_KEY_HEADER, "guessed-key"))
        .set_json(submission(order_id));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A user's bearer token is not a substitute for the key
    let (_, token) = backend.user("bia@example.com").await;
    let req =
        TestRequest::post().uri("/internal/search_results").insert_header(bearer(&token)).set_json(submission(order_id));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    backend.tear_down().await;
}

#[actix_web::test]
async fn submitted_results_show_up_on_the_order() {
    let backend = TestBackend::new().await;
    let (user_id, token) = backend.user("ana@example.com").await;
    let api = OrderFlowApi::new(backend.db().clone(), EventProducers::default());
    let order_id = api.create_order(user_id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap().id;

    let req = TestRequest::post()
        .uri("/internal/search_results")
        .insert_header((API_KEY_HEADER, TEST_API_KEY))
        .set_json(submission(order_id));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, r#"{"detail":"Result saved"}"#);

    let req = TestRequest::get().uri(&format!("/orders/{order_id}")).insert_header(bearer(&token));
    let (_, body) = backend.send(req).await;
    let order: OrderWithResults = parse(&body);
    // Submissions do not move the order along
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    assert_eq!(order.results.len(), 1);
    let result = &order.results[0];
    assert_eq!(result.source_name, "Robô Cartório SP");
    assert_eq!(result.status, ResultStatus::Found);
    assert_eq!(result.found_data_json.as_deref(), Some("{\"livro\":\"A-12\"}"));
    assert_eq!(result.screenshot_path.as_deref(), Some("/shots/1.png"));
    backend.tear_down().await;
}

#[actix_web::test]
async fn bad_submissions() {
    let backend = TestBackend::new().await;
    let req = TestRequest::post()
        .uri("/internal/search_results")
        .insert_header((API_KEY_HEADER, TEST_API_KEY))
        .set_json(submission(31337));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (user_id, _) = backend.user("ana@example.com").await;
    let api = OrderFlowApi::new(backend.db().clone(), EventProducers::default());
    let order_id = api.create_order(user_id, NewOrderRequest::new("Maria Silva", 99.0)).await.unwrap().id;
    for body in [
        json!({"order_id": order_id, "source_name": " ", "status": "FOUND"}),
        json!({"order_id": order_id, "source_name": "Robô", "status": "MAYBE"}),
    ] {
        let req = TestRequest::post()
            .uri("/internal/search_results")
            .insert_header((API_KEY_HEADER, TEST_API_KEY))
            .set_json(&body);
        let (status, _) = backend.send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} should have been rejected");
    }
    backend.tear_down().await;
}
