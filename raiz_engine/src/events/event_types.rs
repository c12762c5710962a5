use serde::{Deserialize, Serialize};

use crate::db_types::SearchOrder;

/// Emitted once per order, when payment is confirmed and the order moves to `PROCESSING`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProcessingEvent {
    pub order: SearchOrder,
}

impl OrderProcessingEvent {
    pub fn new(order: SearchOrder) -> Self {
        Self { order }
    }
}

/// Emitted once per order, when the search finishes and the order reaches its terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order: SearchOrder,
}

impl OrderCompletedEvent {
    pub fn new(order: SearchOrder) -> Self {
        Self { order }
    }

    pub fn found(&self) -> bool {
        self.order.status == crate::db_types::OrderStatusType::CompletedSuccess
    }
}
