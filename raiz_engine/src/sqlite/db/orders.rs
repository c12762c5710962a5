use chrono::Utc;
use log::{debug, trace};
use sqlx::SqliteConnection;

use super::{is_foreign_key_violation, is_unique_violation};
use crate::{
    db_types::{NewSearchOrder, OrderStatusType, SearchOrder},
    traits::OrderStoreError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// New orders always start out as `PENDING_PAYMENT`.
pub async fn insert_order(order: NewSearchOrder, conn: &mut SqliteConnection) -> Result<SearchOrder, OrderStoreError> {
    let now = Utc::now();
    let user_id = order.user_id;
    let order: SearchOrder = sqlx::query_as(
        r#"
            INSERT INTO search_orders (
                user_id,
                status,
                order_price,
                target_name,
                target_dob_approx,
                target_city,
                target_state,
                target_parents_names,
                additional_info,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(order.user_id)
    .bind(OrderStatusType::PendingPayment)
    .bind(order.order_price)
    .bind(order.target_name)
    .bind(order.target_dob_approx)
    .bind(order.target_city)
    .bind(order.target_state)
    .bind(order.target_parents_names)
    .bind(order.additional_info)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| if is_foreign_key_violation(&e) { OrderStoreError::UserNotFound(user_id) } else { e.into() })?;
    debug!("🗃️ Order #{} inserted for user #{user_id}", order.id);
    Ok(order)
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<SearchOrder>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM search_orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Newest first. Orders created in the same instant are ordered by descending id.
pub async fn fetch_orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<SearchOrder>, sqlx::Error> {
    let orders: Vec<SearchOrder> =
        sqlx::query_as("SELECT * FROM search_orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    trace!("🗃️ Fetched {} orders for user #{user_id}", orders.len());
    Ok(orders)
}

/// Sets the checkout session id, provided the order is still awaiting payment. Returns `None` if the order does not
/// exist or is in any other state.
pub async fn set_session_if_pending(
    id: i64,
    session_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<SearchOrder>, OrderStoreError> {
    let order = sqlx::query_as(
        r#"
            UPDATE search_orders SET stripe_session_id = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(session_id)
    .bind(Utc::now())
    .bind(id)
    .bind(OrderStatusType::PendingPayment)
    .fetch_optional(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            OrderStoreError::DuplicateSession(session_id.to_string())
        } else {
            e.into()
        }
    })?;
    Ok(order)
}

/// Conditionally moves the order from `from` to `to`. `completed_at` is set when `to` is terminal.
///
/// This is the per-order guard for every lifecycle transition: the `WHERE status = ...` clause means that of any
/// number of concurrent callers, at most one observes a changed row. Returns `None` if no row matched.
pub async fn transition_status(
    id: i64,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<SearchOrder>, sqlx::Error> {
    let now = Utc::now();
    let completed_at = if to.is_terminal() { Some(now) } else { None };
    let order: Option<SearchOrder> = sqlx::query_as(
        r#"
            UPDATE search_orders SET status = $1, completed_at = $2, updated_at = $3
            WHERE id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(completed_at)
    .bind(now)
    .bind(id)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    match &order {
        Some(_) => debug!("🗃️ Order #{id} moved from {from} to {to}"),
        None => trace!("🗃️ Order #{id} is not {from}. Transition to {to} skipped"),
    }
    Ok(order)
}
