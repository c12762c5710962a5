use thiserror::Error;

use crate::db_types::{NewUser, User, UserUpdate};

#[derive(Debug, Clone, Error)]
pub enum UserStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("A user with email {0} already exists")]
    EmailAlreadyExists(String),
    #[error("User #{0} does not exist")]
    UserNotFound(i64),
    #[error("The update request did not contain any changes")]
    NothingToUpdate,
}

impl From<sqlx::Error> for UserStoreError {
    fn from(e: sqlx::Error) -> Self {
        UserStoreError::DatabaseError(e.to_string())
    }
}

/// Behaviour for storing and querying user records.
///
/// Email addresses are unique. Backends must report a clash as [`UserStoreError::EmailAlreadyExists`], including
/// when the clash is only detected by the database constraint.
#[allow(async_fn_in_trait)]
pub trait UserManagement {
    async fn create_user(&self, user: NewUser) -> Result<User, UserStoreError>;

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, UserStoreError>;

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError>;

    /// Applies the non-empty fields of `update` and returns the new record.
    async fn update_user(&self, user_id: i64, update: UserUpdate) -> Result<User, UserStoreError>;
}
