//! Just enough of the Stripe API for a pay-once hosted checkout.
//!
//! * [`StripeApi`] creates Checkout Sessions.
//! * [`verify_webhook`] checks the `Stripe-Signature` header on webhook deliveries and parses the event.
mod api;
mod config;
mod error;
mod webhook;

mod data_objects;
pub mod helpers;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{CheckoutSessionParams, StripeCheckoutSession, StripeEvent, StripeEventData};
pub use error::StripeApiError;
pub use webhook::{verify_webhook, SignatureHeader, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER};
