use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StripeApiError {
    #[error("Stripe is not configured: {0}")]
    Configuration(String),
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Request to Stripe failed: {0}")]
    RequestError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Stripe returned error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}
