use std::sync::Arc;

use actix_web::{body, http::StatusCode, test, test::TestRequest, web, App, ResponseError};
use raiz_common::Secret;
use raiz_engine::{
    api::user_objects::NewUserRequest,
    events::EventProducers,
    test_utils::{prepare_test_env, TestDatabase},
    traits::{MockPaymentGateway, PaymentGateway},
    AccountApi,
    AuthApi,
    OrderFlowApi,
    SqliteDatabase,
};
use serde::de::DeserializeOwned;

use crate::{
    auth::{TokenIssuer, TokenType},
    config::AuthConfig,
    middleware::ApiKeyMiddlewareFactory,
    server::configure_routes,
};

pub const FRONTEND: &str = "http://localhost:5173";
pub const TEST_API_KEY: &str = "robot-key-for-endpoint-tests";
pub const PASSWORD: &str = "correct horse battery";

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-tests-jwt-secret-0123456789abcdef")
}

pub fn issue_token(user_id: i64, token_type: TokenType) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(user_id, token_type).expect("Failed to sign token")
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// A gateway that fails the test if it is called at all.
pub fn unused_gateway() -> Arc<dyn PaymentGateway> {
    Arc::new(MockPaymentGateway::new())
}

pub struct TestBackend {
    pub env: TestDatabase,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl TestBackend {
    pub async fn new() -> Self {
        Self::with_gateway(unused_gateway()).await
    }

    pub async fn with_gateway(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { env: prepare_test_env().await, gateway }
    }

    pub fn db(&self) -> &SqliteDatabase {
        &self.env.db
    }

    /// Registers a user directly through the engine and returns the user id and an access token.
    pub async fn user(&self, email: &str) -> (i64, String) {
        let api = AuthApi::new(self.db().clone(), FRONTEND);
        let request =
            NewUserRequest { email: email.to_string(), password: PASSWORD.to_string(), full_name: Some("Ana".into()) };
        let user = api.register(request).await.expect("Could not register user");
        (user.id, issue_token(user.id, TokenType::Access))
    }

    /// Sends the request through a fully configured app and returns the status and body.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, String) {
        let db = self.db().clone();
        let api_key = ApiKeyMiddlewareFactory::new(Secret::new(TEST_API_KEY.to_string()));
        let app = App::new()
            .app_data(web::Data::new(OrderFlowApi::new(db.clone(), EventProducers::default())))
            .app_data(web::Data::new(AccountApi::new(db.clone())))
            .app_data(web::Data::new(AuthApi::new(db, FRONTEND)))
            .app_data(web::Data::new(TokenIssuer::new(&get_auth_config())))
            .app_data(web::Data::from(Arc::clone(&self.gateway)))
            .configure(|cfg| configure_routes(cfg, api_key));
        let service = test::init_service(app).await;
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            // Middleware errors are only turned into responses by the HTTP server
            Err(e) => {
                let res = e.as_response_error().error_response();
                let status = res.status();
                let body = body::to_bytes(res.into_body()).await.expect("Could not read error body");
                (status, String::from_utf8_lossy(&body).into_owned())
            },
        }
    }

    pub async fn tear_down(self) {
        self.env.drop_database().await;
    }
}

pub fn parse<T: DeserializeOwned>(body: &str) -> T {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Could not parse '{body}'. {e}"))
}
