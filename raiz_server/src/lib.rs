//! # RaizDigital server
//! This crate hosts the HTTP API and the background workers of the RaizDigital certificate search service. It is
//! responsible for:
//! * Registering and authenticating users, and issuing their access and refresh tokens.
//! * Accepting search orders and opening Stripe checkout sessions for them.
//! * Receiving Stripe payment webhooks, which start the search.
//! * Running the searches and delivering the notification emails in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! See [routes](routes/index.html). Everything under `/internal` requires the internal API key.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
