use chrono::{DateTime, Utc};
use raiz_common::Cents;
use serde::{Deserialize, Serialize};

use crate::{
    api::errors::OrderFlowError,
    db_types::{NewSearchOrder, NewSearchResult, OrderStatusType, ResultStatus, SearchOrder, SearchResult},
};

/// The largest price accepted for a single order.
pub const MAX_ORDER_PRICE: f64 = 1_000_000.0;

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub target_name: String,
    pub order_price: f64,
    #[serde(default)]
    pub target_dob_approx: Option<String>,
    #[serde(default)]
    pub target_city: Option<String>,
    #[serde(default)]
    pub target_state: Option<String>,
    #[serde(default)]
    pub target_parents_names: Option<String>,
    #[serde(default)]
    pub additional_info: Option<String>,
}

impl NewOrderRequest {
    pub fn new<S: Into<String>>(target_name: S, order_price: f64) -> Self {
        Self {
            target_name: target_name.into(),
            order_price,
            target_dob_approx: None,
            target_city: None,
            target_state: None,
            target_parents_names: None,
            additional_info: None,
        }
    }

    /// Validates the request and converts it into a storable order for the user.
    pub fn into_new_order(self, user_id: i64) -> Result<NewSearchOrder, OrderFlowError> {
        let target_name = self.target_name.trim().to_string();
        if target_name.is_empty() {
            return Err(OrderFlowError::Validation("target_name must not be empty".into()));
        }
        if !self.order_price.is_finite() || self.order_price <= 0.0 || self.order_price > MAX_ORDER_PRICE {
            return Err(OrderFlowError::Validation(format!(
                "order_price must be a positive amount no greater than {MAX_ORDER_PRICE}"
            )));
        }
        let order_price = Cents::try_from(self.order_price).map_err(|e| OrderFlowError::Validation(e.to_string()))?;
        if !order_price.is_positive() {
            return Err(OrderFlowError::Validation("order_price must be at least one cent".into()));
        }
        Ok(NewSearchOrder {
            user_id,
            order_price,
            target_name,
            target_dob_approx: non_blank(self.target_dob_approx),
            target_city: non_blank(self.target_city),
            target_state: non_blank(self.target_state),
            target_parents_names: non_blank(self.target_parents_names),
            additional_info: non_blank(self.additional_info),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultView {
    pub id: i64,
    pub source_name: String,
    pub status: ResultStatus,
    pub details: Option<String>,
    pub found_data_json: Option<String>,
    pub screenshot_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<SearchResult> for SearchResultView {
    fn from(r: SearchResult) -> Self {
        Self {
            id: r.id,
            source_name: r.source_name,
            status: r.status,
            details: r.details,
            found_data_json: r.found_data_json,
            screenshot_path: r.screenshot_path,
            timestamp: r.timestamp,
        }
    }
}

/// The public representation of an order, including its search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithResults {
    pub id: i64,
    pub status: OrderStatusType,
    pub order_price: Cents,
    pub target_name: String,
    pub target_dob_approx: Option<String>,
    pub target_city: Option<String>,
    pub target_state: Option<String>,
    pub target_parents_names: Option<String>,
    pub additional_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Vec<SearchResultView>,
}

impl OrderWithResults {
    pub fn new(order: SearchOrder, results: Vec<SearchResult>) -> Self {
        Self {
            id: order.id,
            status: order.status,
            order_price: order.order_price,
            target_name: order.target_name,
            target_dob_approx: order.target_dob_approx,
            target_city: order.target_city,
            target_state: order.target_state,
            target_parents_names: order.target_parents_names,
            additional_info: order.additional_info,
            created_at: order.created_at,
            completed_at: order.completed_at,
            results: results.into_iter().map(SearchResultView::from).collect(),
        }
    }
}

/// What a payment confirmation callback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentConfirmation {
    /// This callback moved the order to `PROCESSING` and queued the search.
    Started(SearchOrder),
    /// The order had already left `PENDING_PAYMENT`. Nothing was changed.
    AlreadyProcessed(i64),
    /// The event type is not one that affects orders.
    Ignored(String),
}

/// A result reported by a trusted external search robot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultSubmission {
    pub order_id: i64,
    pub source_name: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub found_data_json: Option<String>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl SearchResultSubmission {
    pub fn into_new_result(self) -> Result<NewSearchResult, OrderFlowError> {
        let source_name = self.source_name.trim().to_string();
        if source_name.is_empty() {
            return Err(OrderFlowError::Validation("source_name must not be empty".into()));
        }
        Ok(NewSearchResult {
            order_id: self.order_id,
            source_name,
            status: self.status,
            details: non_blank(self.details),
            found_data_json: self.found_data_json,
            screenshot_path: non_blank(self.screenshot_path),
        })
    }
}
