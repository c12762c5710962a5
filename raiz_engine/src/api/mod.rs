//! # Order engine public API
//!
//! The `api` module exposes the programmatic API of the order engine. The API is modular, so that clients can pick
//! the functionality they need.
//!
//! * [`order_flow_api`] drives the order lifecycle: creating orders, starting checkout, reacting to payment
//!   confirmations and recording search outcomes.
//! * [`accounts_api`] provides read access to a user's orders and results, and profile management.
//! * [`auth_api`] handles registration, credential checks and password resets.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use raiz_engine::{AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements OrderManagement and UserManagement
//! let api = AccountApi::new(db);
//! let orders = api.orders_for_user(user_id).await?;
//! ```
pub mod accounts_api;
pub mod auth_api;
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod user_objects;
