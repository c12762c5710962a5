mod auth;
mod checkout;
mod helpers;
mod internal;
mod orders;
