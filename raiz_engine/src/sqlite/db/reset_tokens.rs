use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::PasswordResetToken;

pub async fn delete_tokens_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1").bind(user_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn insert_token(
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PasswordResetToken, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO password_reset_tokens (user_id, token, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

pub async fn fetch_token(token: &str, conn: &mut SqliteConnection) -> Result<Option<PasswordResetToken>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM password_reset_tokens WHERE token = $1").bind(token).fetch_optional(conn).await
}

/// Deletes the token, returning the deleted record if it existed.
pub async fn take_token_by_id(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PasswordResetToken>, sqlx::Error> {
    sqlx::query_as("DELETE FROM password_reset_tokens WHERE id = $1 RETURNING *").bind(id).fetch_optional(conn).await
}
