use chrono::Utc;
use log::debug;
use sqlx::{QueryBuilder, SqliteConnection};

use super::is_unique_violation;
use crate::{
    db_types::{NewUser, User, UserUpdate},
    traits::UserStoreError,
};

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, UserStoreError> {
    let now = Utc::now();
    let email = user.email.clone();
    let user = sqlx::query_as(
        r#"
            INSERT INTO users (email, password_hash, full_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *;
        "#,
    )
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.full_name)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| if is_unique_violation(&e) { UserStoreError::EmailAlreadyExists(email) } else { e.into() })?;
    Ok(user)
}

pub async fn fetch_user_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_user_by_email(email: &str, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(conn).await
}

pub async fn update_user(id: i64, update: UserUpdate, conn: &mut SqliteConnection) -> Result<User, UserStoreError> {
    if update.is_empty() {
        debug!("🗃️ No fields to update for user #{id}. Update request skipped.");
        return Err(UserStoreError::NothingToUpdate);
    }
    let new_email = update.email.clone();
    let mut builder = QueryBuilder::new("UPDATE users SET updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(email) = update.email {
        builder.push(", email = ");
        builder.push_bind(email);
    }
    if let Some(name) = update.full_name {
        builder.push(", full_name = ");
        builder.push_bind(name);
    }
    if let Some(hash) = update.password_hash {
        builder.push(", password_hash = ");
        builder.push_bind(hash);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    let user: Option<User> = builder.build_query_as::<User>().fetch_optional(conn).await.map_err(|e| {
        match (is_unique_violation(&e), new_email) {
            (true, Some(email)) => UserStoreError::EmailAlreadyExists(email),
            _ => e.into(),
        }
    })?;
    user.ok_or(UserStoreError::UserNotFound(id))
}
