//! # Storage backend contracts
//!
//! This module defines the interface contracts that database *backends* must fulfil in order to power the order
//! engine, as well as the contract for the external payment provider.
//!
//! * [`OrderLifecycleDatabase`] is the highest level of behaviour. It performs the atomic lifecycle transitions of a
//!   search order, enqueueing follow-up jobs in the same transaction as the status change.
//! * [`OrderManagement`] stores and queries orders and their search results.
//! * [`UserManagement`] stores and queries user records.
//! * [`AuthManagement`] manages password reset tokens.
//! * [`JobQueue`] is the durable hand-off between the web tier and the background workers.
//! * [`PaymentGateway`] is the contract for the hosted checkout provider.
mod auth_management;
mod job_queue;
mod order_lifecycle;
mod order_management;
mod payment_gateway;
mod user_management;

pub use auth_management::AuthManagement;
pub use job_queue::{JobQueue, JobQueueError};
pub use order_lifecycle::OrderLifecycleDatabase;
pub use order_management::{OrderManagement, OrderStoreError};
#[cfg(any(test, feature = "test_utils"))]
pub use payment_gateway::MockPaymentGateway;
pub use payment_gateway::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, WebhookEvent};
pub use user_management::{UserManagement, UserStoreError};
