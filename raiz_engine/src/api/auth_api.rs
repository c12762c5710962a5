//! Registration, credential checks and password resets.
//!
//! Token issuing is left to the caller. This API only ever answers the question "who is this user?".
use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    api::{errors::AuthApiError, user_objects::NewUserRequest},
    db_types::{EmailMessage, JobPayload, NewUser, User},
    helpers::{hash_password, is_valid_email, new_reset_token, normalize_email, verify_password, MIN_PASSWORD_LENGTH},
    notifications::{password_reset_email, welcome_email},
    traits::{AuthManagement, JobQueue, UserManagement},
};

pub const DEFAULT_RESET_TOKEN_TTL_MINUTES: i64 = 60;

pub struct AuthApi<B> {
    db: B,
    frontend_base_url: String,
    reset_token_ttl: Duration,
}

impl<B: Debug> Debug for AuthApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthApi ({:?})", self.db)
    }
}

fn check_password_length(password: &str) -> Result<(), AuthApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    Ok(())
}

async fn hash_in_background(password: String) -> Result<String, AuthApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthApiError::PasswordError(e.to_string()))?
        .map_err(AuthApiError::from)
}

impl<B> AuthApi<B>
where B: UserManagement + AuthManagement + JobQueue
{
    pub fn new<S: Into<String>>(db: B, frontend_base_url: S) -> Self {
        let reset_token_ttl = Duration::minutes(DEFAULT_RESET_TOKEN_TTL_MINUTES);
        Self { db, frontend_base_url: frontend_base_url.into(), reset_token_ttl }
    }

    pub fn with_reset_token_ttl(mut self, ttl: Duration) -> Self {
        self.reset_token_ttl = ttl;
        self
    }

    /// Creates a new user and queues the welcome email.
    pub async fn register(&self, request: NewUserRequest) -> Result<User, AuthApiError> {
        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(AuthApiError::Validation(format!("{email} is not a valid email address")));
        }
        check_password_length(&request.password)?;
        if self.db.fetch_user_by_email(&email).await?.is_some() {
            debug!("🔐️ Registration refused. {email} is already registered");
            return Err(AuthApiError::EmailAlreadyRegistered);
        }
        let password_hash = hash_in_background(request.password).await?;
        let full_name = request.full_name.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let user = self.db.create_user(NewUser { email, password_hash, full_name }).await?;
        info!("🔐️ New user #{} registered", user.id);
        self.send(welcome_email(&user)).await;
        Ok(user)
    }

    /// Checks the credentials and returns the user they belong to.
    ///
    /// An unknown email and a wrong password produce the same error.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthApiError> {
        let email = normalize_email(email);
        let Some(user) = self.db.fetch_user_by_email(&email).await? else {
            debug!("🔐️ Login attempt for unknown email");
            return Err(AuthApiError::InvalidCredentials);
        };
        let hash = user.password_hash.clone();
        let password = password.to_string();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthApiError::PasswordError(e.to_string()))?;
        if !valid {
            debug!("🔐️ Wrong password for user #{}", user.id);
            return Err(AuthApiError::InvalidCredentials);
        }
        trace!("🔐️ User #{} authenticated", user.id);
        Ok(user)
    }

    pub async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, AuthApiError> {
        Ok(self.db.fetch_user(user_id).await?)
    }

    /// Issues a reset token and queues the reset email, if the email belongs to a user.
    ///
    /// Returns `Ok(())` whether or not the user exists, so that callers cannot use it to probe for accounts. Issuing
    /// a new token invalidates any earlier ones.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthApiError> {
        let email = normalize_email(email);
        let Some(user) = self.db.fetch_user_by_email(&email).await? else {
            debug!("🔐️ Password reset requested for unknown email");
            return Ok(());
        };
        let token = new_reset_token();
        let expires_at = Utc::now() + self.reset_token_ttl;
        self.db.replace_reset_token(user.id, &token, expires_at).await?;
        info!("🔐️ Password reset token issued for user #{}", user.id);
        self.send(password_reset_email(&user, &self.frontend_base_url, &token)).await;
        Ok(())
    }

    /// Sets a new password using a reset token. The token is consumed.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthApiError> {
        check_password_length(new_password)?;
        let record = self.db.fetch_reset_token(token).await?.ok_or(AuthApiError::InvalidResetToken)?;
        if record.is_expired(Utc::now()) {
            debug!("🔐️ Expired reset token used for user #{}", record.user_id);
            self.db.delete_reset_token(record.id).await?;
            return Err(AuthApiError::InvalidResetToken);
        }
        let hash = hash_in_background(new_password.to_string()).await?;
        if !self.db.reset_password_with_token(record.id, &hash).await? {
            // Another request consumed the token first
            return Err(AuthApiError::InvalidResetToken);
        }
        info!("🔐️ Password for user #{} has been reset", record.user_id);
        Ok(())
    }

    /// Queues an email. Failing to queue a courtesy email never fails the request that caused it.
    async fn send(&self, message: EmailMessage) {
        let subject = message.subject.clone();
        if let Err(e) = self.db.enqueue_job(JobPayload::SendEmail(message)).await {
            error!("🔐️📧️ Could not queue '{subject}' email. {e}");
        }
    }
}
