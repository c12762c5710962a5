//! Adapters for the third-party services the server talks to.
pub mod mail;
pub mod stripe;

pub use mail::{MailError, Mailer};
pub use stripe::StripeGateway;
