//! Data types that are persisted by the storage backends.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use raiz_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

//--------------------------------------         User          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The name used to greet the user in emails. Falls back to the email address.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => self.email.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
}

/// A partial update of a user record. Only the `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.full_name.is_none() && self.password_hash.is_none()
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been created and is waiting for the payment provider to confirm payment.
    PendingPayment,
    /// Payment has been confirmed and the search is running.
    Processing,
    /// The search finished and at least one source found a record.
    CompletedSuccess,
    /// The search finished without any source finding a record.
    CompletedFailure,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CompletedSuccess | Self::CompletedFailure)
    }

    /// The lifecycle only ever moves forward: `PendingPayment -> Processing -> Completed*`.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!((self, next), (PendingPayment, Processing) | (Processing, CompletedSuccess | CompletedFailure))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatusType::PendingPayment => "PENDING_PAYMENT",
            OrderStatusType::Processing => "PROCESSING",
            OrderStatusType::CompletedSuccess => "COMPLETED_SUCCESS",
            OrderStatusType::CompletedFailure => "COMPLETED_FAILURE",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_PAYMENT" => Ok(Self::PendingPayment),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED_SUCCESS" => Ok(Self::CompletedSuccess),
            "COMPLETED_FAILURE" => Ok(Self::CompletedFailure),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------     SearchOrder       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOrder {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatusType,
    pub order_price: Cents,
    pub target_name: String,
    pub target_dob_approx: Option<String>,
    pub target_city: Option<String>,
    pub target_state: Option<String>,
    pub target_parents_names: Option<String>,
    pub additional_info: Option<String>,
    pub stripe_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSearchOrder {
    pub user_id: i64,
    pub order_price: Cents,
    pub target_name: String,
    pub target_dob_approx: Option<String>,
    pub target_city: Option<String>,
    pub target_state: Option<String>,
    pub target_parents_names: Option<String>,
    pub additional_info: Option<String>,
}

impl NewSearchOrder {
    pub fn new<S: Into<String>>(user_id: i64, target_name: S, order_price: Cents) -> Self {
        Self {
            user_id,
            order_price,
            target_name: target_name.into(),
            target_dob_approx: None,
            target_city: None,
            target_state: None,
            target_parents_names: None,
            additional_info: None,
        }
    }

    pub fn with_city<S: Into<String>>(mut self, city: S, state: S) -> Self {
        self.target_city = Some(city.into());
        self.target_state = Some(state.into());
        self
    }

    pub fn with_dob<S: Into<String>>(mut self, dob: S) -> Self {
        self.target_dob_approx = Some(dob.into());
        self
    }

    pub fn with_parents<S: Into<String>>(mut self, parents: S) -> Self {
        self.target_parents_names = Some(parents.into());
        self
    }

    pub fn with_info<S: Into<String>>(mut self, info: S) -> Self {
        self.additional_info = Some(info.into());
        self
    }
}

//--------------------------------------     ResultStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Found,
    NotFound,
    SourceUnavailable,
    Error,
}

impl Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultStatus::Found => write!(f, "FOUND"),
            ResultStatus::NotFound => write!(f, "NOT_FOUND"),
            ResultStatus::SourceUnavailable => write!(f, "SOURCE_UNAVAILABLE"),
            ResultStatus::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for ResultStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FOUND" => Ok(Self::Found),
            "NOT_FOUND" => Ok(Self::NotFound),
            "SOURCE_UNAVAILABLE" => Ok(Self::SourceUnavailable),
            "ERROR" => Ok(Self::Error),
            s => Err(ConversionError(format!("Invalid result status: {s}"))),
        }
    }
}

//--------------------------------------     SearchResult      ---------------------------------------------------------
/// The outcome of querying one source for one order. Results are never updated once written.
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub order_id: i64,
    pub source_name: String,
    pub status: ResultStatus,
    pub details: Option<String>,
    pub found_data_json: Option<String>,
    pub screenshot_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSearchResult {
    pub order_id: i64,
    pub source_name: String,
    pub status: ResultStatus,
    pub details: Option<String>,
    pub found_data_json: Option<String>,
    pub screenshot_path: Option<String>,
}

impl NewSearchResult {
    pub fn new<S: Into<String>>(order_id: i64, source_name: S, status: ResultStatus) -> Self {
        Self {
            order_id,
            source_name: source_name.into(),
            status,
            details: None,
            found_data_json: None,
            screenshot_path: None,
        }
    }

    /// An `ERROR` result, used when a source fails, panics or times out.
    pub fn error<S: Into<String>, D: Into<String>>(order_id: i64, source_name: S, details: D) -> Self {
        Self::new(order_id, source_name, ResultStatus::Error).with_details(details)
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_found_data(mut self, data: serde_json::Value) -> Self {
        self.found_data_json = Some(data.to_string());
        self
    }

    pub fn with_screenshot<S: Into<String>>(mut self, path: S) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }
}

//--------------------------------------  PasswordResetToken   ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct PasswordResetToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

//--------------------------------------    EmailMessage       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(to: S1, subject: S2, body: S3) -> Self {
        Self { to_email: to.into(), subject: subject.into(), body: body.into() }
    }
}

//--------------------------------------         Jobs          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobQueueName {
    Search,
    Email,
}

impl Display for JobQueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobQueueName::Search => write!(f, "search"),
            JobQueueName::Email => write!(f, "email"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// The unit of work handed from the web tier to the background workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobPayload {
    RunSearch { order_id: i64 },
    SendEmail(EmailMessage),
}

impl JobPayload {
    pub fn queue(&self) -> JobQueueName {
        match self {
            JobPayload::RunSearch { .. } => JobQueueName::Search,
            JobPayload::SendEmail(_) => JobQueueName::Email,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JobRecord {
    pub id: i64,
    pub queue: JobQueueName,
    pub payload: String,
    pub status: JobStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    /// Unix timestamp in milliseconds
    pub run_after: i64,
    /// Unix timestamp in milliseconds
    pub locked_until: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A job that has been claimed by a worker, with its payload decoded.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub attempts: i64,
    pub max_attempts: i64,
    pub payload: JobPayload,
}

impl Job {
    pub fn is_last_attempt(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
