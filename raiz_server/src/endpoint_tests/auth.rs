use actix_web::{http::StatusCode, test::TestRequest};
use raiz_engine::{api::user_objects::UserProfile, db_types::JobQueueName, traits::JobQueue};
use serde_json::json;

use super::helpers::{bearer, issue_token, parse, TestBackend, PASSWORD};
use crate::{auth::TokenType, data_objects::TokenResponse, routes::FORGOT_PASSWORD_REPLY};

#[actix_web::test]
async fn register_then_log_in() {
    let backend = TestBackend::new().await;
    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"email": " Maria@Example.com", "password": PASSWORD, "full_name": "Maria Souza"}));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::CREATED);
    let profile: UserProfile = parse(&body);
    assert_eq!(profile.email, "maria@example.com");
    assert_eq!(profile.full_name.as_deref(), Some("Maria Souza"));
    assert!(!body.contains("password"));

    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({"email": "maria@example.com", "password": PASSWORD}));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Email already registered"}"#);

    // OAuth2 password form
    let req =
        TestRequest::post().uri("/auth/login").set_form([("username", "maria@example.com"), ("password", PASSWORD)]);
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let tokens: TokenResponse = parse(&body);
    assert_eq!(tokens.token_type, "bearer");

    let req = TestRequest::post().uri("/auth/login").set_json(json!({"email": "maria@example.com", "password": PASSWORD}));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::get().uri("/users/me").insert_header(bearer(&tokens.access_token));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<UserProfile>(&body).id, profile.id);
    backend.tear_down().await;
}

#[actix_web::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let backend = TestBackend::new().await;
    backend.user("ana@example.com").await;
    let wrong_password = TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"username": "ana@example.com", "password": "not the password"}));
    let unknown_user =
        TestRequest::post().uri("/auth/login").set_json(json!({"username": "nobody@example.com", "password": PASSWORD}));
    let (s1, b1) = backend.send(wrong_password).await;
    let (s2, b2) = backend.send(unknown_user).await;
    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(b1, r#"{"error":"Incorrect email or password"}"#);
    assert_eq!(b1, b2);
    backend.tear_down().await;
}

#[actix_web::test]
async fn protected_routes_need_an_access_token() {
    let backend = TestBackend::new().await;
    let (user_id, _) = backend.user("ana@example.com").await;

    let (status, body) = backend.send(TestRequest::get().uri("/users/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Not authenticated"}"#);

    let req = TestRequest::get().uri("/orders").insert_header(bearer("not.a.jwt"));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let refresh = issue_token(user_id, TokenType::Refresh);
    let req = TestRequest::get().uri("/users/me").insert_header(bearer(&refresh));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A valid token for a user that does not exist
    let ghost = issue_token(user_id + 100, TokenType::Access);
    let req = TestRequest::get().uri("/users/me").insert_header(bearer(&ghost));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    backend.tear_down().await;
}

#[actix_web::test]
async fn refresh_tokens() {
    let backend = TestBackend::new().await;
    let (user_id, access) = backend.user("ana@example.com").await;
    let refresh = issue_token(user_id, TokenType::Refresh);

    let req = TestRequest::post().uri(&format!("/auth/refresh?token={refresh}"));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let tokens: TokenResponse = parse(&body);
    assert!(!tokens.access_token.is_empty());

    let req = TestRequest::post().uri("/auth/refresh").set_json(json!({"refresh_token": refresh}));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::post().uri(&format!("/auth/refresh?token={access}"));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = backend.send(TestRequest::post().uri("/auth/refresh")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    backend.tear_down().await;
}

#[actix_web::test]
async fn forgot_password_never_reveals_accounts() {
    let backend = TestBackend::new().await;
    backend.user("ana@example.com").await;
    let expected = json!({ "detail": FORGOT_PASSWORD_REPLY }).to_string();
    for email in ["ana@example.com", "nobody@example.com"] {
        let req = TestRequest::post().uri("/auth/forgot-password").set_json(json!({ "email": email }));
        let (status, body) = backend.send(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, expected);
    }
    // Welcome email plus one reset email
    let emails = backend.db().fetch_jobs(JobQueueName::Email).await.unwrap();
    assert_eq!(emails.len(), 2);
    assert!(emails[1].payload.contains("/redefinir-senha/"));

    let req = TestRequest::post()
        .uri("/auth/reset-password")
        .set_json(json!({"token": "made-up", "new_password": "another password"}));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid or expired token"}"#);
    backend.tear_down().await;
}

#[actix_web::test]
async fn profile_updates() {
    let backend = TestBackend::new().await;
    let (_, token) = backend.user("ana@example.com").await;
    backend.user("taken@example.com").await;

    let req = TestRequest::put().uri("/users/me").insert_header(bearer(&token)).set_json(json!({"full_name": "Ana Lima"}));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<UserProfile>(&body).full_name.as_deref(), Some("Ana Lima"));

    let req =
        TestRequest::put().uri("/users/me").insert_header(bearer(&token)).set_json(json!({"email": "taken@example.com"}));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::put()
        .uri("/users/me")
        .insert_header(bearer(&token))
        .set_json(json!({"new_password": "a brand new password"}));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Current password is required"));

    let req = TestRequest::put()
        .uri("/users/me")
        .insert_header(bearer(&token))
        .set_json(json!({"current_password": PASSWORD, "new_password": "a brand new password"}));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let req = TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({"username": "ana@example.com", "password": "a brand new password"}));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    backend.tear_down().await;
}

#[actix_web::test]
async fn health_check() {
    let backend = TestBackend::new().await;
    let (status, body) = backend.send(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
    backend.tear_down().await;
}
