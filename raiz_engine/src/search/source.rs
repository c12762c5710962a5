use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::db_types::{NewSearchResult, ResultStatus, SearchOrder};

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Request to the source failed: {0}")]
    Request(String),
    #[error("Could not understand the source's response: {0}")]
    Parse(String),
}

/// What a single source reports for an order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub status: ResultStatus,
    pub details: Option<String>,
    pub found_data: Option<Value>,
    pub screenshot_path: Option<String>,
}

impl SourceOutcome {
    fn with_status(status: ResultStatus) -> Self {
        Self { status, details: None, found_data: None, screenshot_path: None }
    }

    pub fn found(data: Value) -> Self {
        Self { found_data: Some(data), ..Self::with_status(ResultStatus::Found) }
    }

    pub fn not_found() -> Self {
        Self::with_status(ResultStatus::NotFound)
    }

    pub fn unavailable<S: Into<String>>(details: S) -> Self {
        Self { details: Some(details.into()), ..Self::with_status(ResultStatus::SourceUnavailable) }
    }

    pub fn with_screenshot<S: Into<String>>(mut self, path: S) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }

    pub fn into_result(self, order_id: i64, source_name: &str) -> NewSearchResult {
        NewSearchResult {
            order_id,
            source_name: source_name.to_string(),
            status: self.status,
            details: self.details,
            found_data_json: self.found_data.map(|v| v.to_string()),
            screenshot_path: self.screenshot_path,
        }
    }
}

/// A search source plugin.
///
/// Implementations only query their registry and report what they found. They never touch the order or the store.
/// A search may be abandoned at any `.await` point if it exceeds its time budget.
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// The stable, human-readable name stored with every result from this source.
    fn name(&self) -> &str;

    async fn search(&self, order: &SearchOrder) -> Result<SourceOutcome, SourceError>;
}
