//! Lifecycle event hooks.
//!
//! Components outside the order engine can subscribe to lifecycle transitions (for example, to wake the search workers
//! as soon as an order is paid) without the engine knowing about them.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
