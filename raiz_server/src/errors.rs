use actix_web::{
    error::ResponseError,
    http::{
        header::{ContentType, WWW_AUTHENTICATE},
        StatusCode,
    },
    HttpResponse,
};
use log::error;
use raiz_engine::{AccountApiError, AuthApiError, OrderFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    NoRecordFound(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    InvalidOrderState(String),
    #[error("{0}")]
    InvalidSignature(String),
    #[error("Payment provider error. {0}")]
    PaymentProviderError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidOrderState(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PaymentProviderError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        response.insert_header(ContentType::json());
        if matches!(self, Self::AuthenticationError(_)) {
            response.insert_header((WWW_AUTHENTICATE, "Bearer"));
        }
        if self.status_code().is_server_error() {
            error!("💻️ Request failed. {self}");
        }
        response.body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingToken,
    #[error("Could not validate credentials. {0}")]
    InvalidToken(String),
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Could not validate credentials. The token is not a {0} token")]
    WrongTokenType(String),
    #[error("Could not validate credentials. The account no longer exists")]
    AccountNotFound,
    #[error("Invalid API key")]
    InvalidApiKey,
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::NotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::InvalidState { .. } => Self::InvalidOrderState(e.to_string()),
            OrderFlowError::InvalidSignature(_) => Self::InvalidSignature(e.to_string()),
            OrderFlowError::MalformedEvent(_) => Self::InvalidRequestBody(e.to_string()),
            OrderFlowError::Validation(_) => Self::ValidationError(e.to_string()),
            OrderFlowError::GatewayError(s) => Self::PaymentProviderError(s),
            OrderFlowError::DatabaseError(s) => Self::BackendError(s),
        }
    }
}

impl From<AuthApiError> for ServerError {
    fn from(e: AuthApiError) -> Self {
        match e {
            AuthApiError::InvalidCredentials => Self::AuthenticationError(AuthError::InvalidCredentials),
            AuthApiError::UserNotFound(_) => Self::AuthenticationError(AuthError::AccountNotFound),
            AuthApiError::EmailAlreadyRegistered | AuthApiError::InvalidResetToken | AuthApiError::Validation(_) => {
                Self::ValidationError(e.to_string())
            },
            AuthApiError::DatabaseError(_) | AuthApiError::PasswordError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::UserNotFound(_) => Self::AuthenticationError(AuthError::AccountNotFound),
            AccountApiError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            AccountApiError::EmailAlreadyRegistered |
            AccountApiError::CurrentPasswordRequired |
            AccountApiError::IncorrectPassword |
            AccountApiError::Validation(_) => Self::ValidationError(e.to_string()),
            AccountApiError::DatabaseError(_) | AccountApiError::PasswordError(_) => Self::BackendError(e.to_string()),
        }
    }
}
