use chrono::Utc;
use sqlx::SqliteConnection;

use super::is_foreign_key_violation;
use crate::{
    db_types::{NewSearchResult, ResultStatus, SearchResult},
    traits::OrderStoreError,
};

pub async fn insert_result(result: NewSearchResult, conn: &mut SqliteConnection) -> Result<SearchResult, OrderStoreError> {
    let order_id = result.order_id;
    let result = sqlx::query_as(
        r#"
            INSERT INTO search_results (
                order_id,
                source_name,
                status,
                details,
                found_data_json,
                screenshot_path,
                timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(result.order_id)
    .bind(result.source_name)
    .bind(result.status)
    .bind(result.details)
    .bind(result.found_data_json)
    .bind(result.screenshot_path)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
    .map_err(|e| if is_foreign_key_violation(&e) { OrderStoreError::OrderNotFound(order_id) } else { e.into() })?;
    Ok(result)
}

pub async fn fetch_results_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<SearchResult>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM search_results WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

pub async fn fetch_results_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<SearchResult>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT search_results.* FROM search_results
            JOIN search_orders ON search_orders.id = search_results.order_id
            WHERE search_orders.user_id = $1
            ORDER BY search_results.id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}

/// Whether any stored result for the order is `FOUND`.
pub async fn has_found_result(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_results WHERE order_id = $1 AND status = $2")
        .bind(order_id)
        .bind(ResultStatus::Found)
        .fetch_one(conn)
        .await?;
    Ok(found > 0)
}
