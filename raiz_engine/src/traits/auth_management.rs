use chrono::{DateTime, Utc};

use crate::{db_types::PasswordResetToken, traits::UserStoreError};

/// Behaviour for managing password reset tokens.
#[allow(async_fn_in_trait)]
pub trait AuthManagement {
    /// Stores a new reset token for the user. Any tokens previously issued to the user are deleted in the same
    /// transaction, so that only the most recent link is ever valid.
    async fn replace_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, UserStoreError>;

    async fn fetch_reset_token(&self, token: &str) -> Result<Option<PasswordResetToken>, UserStoreError>;

    async fn delete_reset_token(&self, token_id: i64) -> Result<(), UserStoreError>;

    /// Atomically sets the user's password hash and consumes the reset token.
    ///
    /// Returns `false` if the token had already been consumed, in which case the password is left unchanged.
    async fn reset_password_with_token(&self, token_id: i64, password_hash: &str) -> Result<bool, UserStoreError>;
}
