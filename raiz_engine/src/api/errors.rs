use thiserror::Error;

use crate::{
    db_types::OrderStatusType,
    helpers::PasswordError,
    traits::{GatewayError, JobQueueError, OrderStoreError, UserStoreError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Order #{0} not found")]
    NotFound(i64),
    #[error("Order #{order_id} is {status}, which does not allow this operation")]
    InvalidState { order_id: i64, status: OrderStatusType },
    #[error("Invalid payment provider signature. {0}")]
    InvalidSignature(String),
    #[error("Malformed payment event. {0}")]
    MalformedEvent(String),
    #[error("Payment provider error. {0}")]
    GatewayError(String),
    #[error("Invalid order request. {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<OrderStoreError> for OrderFlowError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => OrderFlowError::NotFound(id),
            e => OrderFlowError::DatabaseError(e.to_string()),
        }
    }
}

impl From<GatewayError> for OrderFlowError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::InvalidSignature(s) => OrderFlowError::InvalidSignature(s),
            e => OrderFlowError::GatewayError(e.to_string()),
        }
    }
}

impl From<JobQueueError> for OrderFlowError {
    fn from(e: JobQueueError) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthApiError {
    /// Deliberately the same for an unknown email and a wrong password.
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailAlreadyRegistered,
    #[error("Invalid or expired token")]
    InvalidResetToken,
    #[error("{0}")]
    Validation(String),
    #[error("User #{0} not found")]
    UserNotFound(i64),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Could not process password. {0}")]
    PasswordError(String),
}

impl From<UserStoreError> for AuthApiError {
    fn from(e: UserStoreError) -> Self {
        match e {
            UserStoreError::EmailAlreadyExists(_) => AuthApiError::EmailAlreadyRegistered,
            UserStoreError::UserNotFound(id) => AuthApiError::UserNotFound(id),
            e => AuthApiError::DatabaseError(e.to_string()),
        }
    }
}

impl From<PasswordError> for AuthApiError {
    fn from(e: PasswordError) -> Self {
        AuthApiError::PasswordError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("User #{0} not found")]
    UserNotFound(i64),
    #[error("Order #{0} not found")]
    OrderNotFound(i64),
    #[error("Email already registered")]
    EmailAlreadyRegistered,
    #[error("Current password is required to set a new password")]
    CurrentPasswordRequired,
    #[error("Current password is incorrect")]
    IncorrectPassword,
    #[error("{0}")]
    Validation(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Could not process password. {0}")]
    PasswordError(String),
}

impl From<OrderStoreError> for AccountApiError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => AccountApiError::OrderNotFound(id),
            OrderStoreError::UserNotFound(id) => AccountApiError::UserNotFound(id),
            e => AccountApiError::DatabaseError(e.to_string()),
        }
    }
}

impl From<UserStoreError> for AccountApiError {
    fn from(e: UserStoreError) -> Self {
        match e {
            UserStoreError::EmailAlreadyExists(_) => AccountApiError::EmailAlreadyRegistered,
            UserStoreError::UserNotFound(id) => AccountApiError::UserNotFound(id),
            e => AccountApiError::DatabaseError(e.to_string()),
        }
    }
}

impl From<PasswordError> for AccountApiError {
    fn from(e: PasswordError) -> Self {
        AccountApiError::PasswordError(e.to_string())
    }
}
