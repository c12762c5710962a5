use async_trait::async_trait;
use raiz_common::Cents;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Payment provider is not configured correctly: {0}")]
    Configuration(String),
    #[error("Webhook signature is invalid: {0}")]
    InvalidSignature(String),
    #[error("Payment provider request failed: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub order_id: i64,
    pub price: Cents,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// A webhook event whose signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub event_type: String,
    /// The raw `order_id` found in the event metadata, if any.
    pub order_reference: Option<String>,
}

/// The hosted checkout provider.
#[cfg_attr(any(test, feature = "test_utils"), mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a hosted checkout session for the order and returns its id and redirect URL.
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError>;

    /// Verifies the provider's signature over the raw request body and extracts the event.
    ///
    /// Any mismatch, stale timestamp or unparseable body yields [`GatewayError::InvalidSignature`].
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, GatewayError>;
}
