//! # Password hashing
//!
//! Passwords are hashed with Argon2id using the `argon2` crate's default parameters and a random 16-byte salt. The
//! PHC string that is stored carries the algorithm, parameters and salt, so hashes produced with older parameters
//! remain verifiable.
//!
//! Hashing is deliberately expensive. Callers on an async runtime should run these functions on a blocking thread.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Password hashing error: {0}")]
pub struct PasswordError(String);

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError(e.to_string()))?;
    Ok(hash.to_string())
}

/// Returns `true` if `password` matches the stored hash. A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}
