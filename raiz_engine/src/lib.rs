//! RaizDigital order engine
//!
//! The order engine is the core of the RaizDigital civil registry certificate search service. Users place *search
//! orders* for a person's certificate, pay for them through a hosted checkout, and the engine then searches a set of
//! registries and reports back. This library is independent of the web layer and of any particular payment provider.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`traits`] and [`sqlite`]). The traits define what a backend must provide. SQLite is the supported
//!    backend. The persisted data types live in [`db_types`].
//! 2. The public API ([`api`]). [`OrderFlowApi`] is the order lifecycle state machine. [`AccountApi`] and [`AuthApi`]
//!    cover users and their orders.
//! 3. Search execution ([`search`]). Pluggable sources and the orchestrator that runs them.
//! 4. Notifications ([`notifications`]) and lifecycle hooks ([`events`]).
//!
//! Work that must survive a restart (running a search, sending an email) is handed to background workers through the
//! durable [`traits::JobQueue`].
pub mod api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod notifications;
pub mod search;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use api::{
    accounts_api::AccountApi,
    auth_api::AuthApi,
    errors::{AccountApiError, AuthApiError, OrderFlowError},
    order_flow_api::OrderFlowApi,
    order_objects,
    user_objects,
};
pub use search::SearchOrchestrator;
