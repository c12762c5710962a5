//! Read access to a user's orders, and profile management.
use std::{collections::HashMap, fmt::Debug};

use log::*;

use crate::{
    api::{
        errors::AccountApiError,
        order_objects::OrderWithResults,
        user_objects::{ProfileUpdateRequest, UserProfile},
    },
    db_types::{SearchResult, User, UserUpdate},
    helpers::{hash_password, is_valid_email, normalize_email, verify_password, MIN_PASSWORD_LENGTH},
    traits::{OrderManagement, UserManagement},
};

pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: OrderManagement + UserManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn profile(&self, user_id: i64) -> Result<UserProfile, AccountApiError> {
        let user = self.user(user_id).await?;
        Ok(user.into())
    }

    /// All of the user's orders with their results, newest first.
    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<OrderWithResults>, AccountApiError> {
        let orders = self.db.fetch_orders_for_user(user_id).await?;
        let mut results_by_order: HashMap<i64, Vec<SearchResult>> = HashMap::new();
        for result in self.db.fetch_results_for_user(user_id).await? {
            results_by_order.entry(result.order_id).or_default().push(result);
        }
        trace!("👤️ User #{user_id} has {} orders", orders.len());
        let orders = orders
            .into_iter()
            .map(|order| {
                let results = results_by_order.remove(&order.id).unwrap_or_default();
                OrderWithResults::new(order, results)
            })
            .collect();
        Ok(orders)
    }

    /// A single order with its results. Orders belonging to other users are reported as not found.
    pub async fn order_for_user(&self, user_id: i64, order_id: i64) -> Result<OrderWithResults, AccountApiError> {
        let order = self
            .db
            .fetch_order(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(AccountApiError::OrderNotFound(order_id))?;
        let results = self.db.fetch_results_for_order(order_id).await?;
        Ok(OrderWithResults::new(order, results))
    }

    /// Updates the user's name, email and/or password.
    ///
    /// A new email must not belong to another user. A new password requires the correct current password.
    pub async fn update_profile(
        &self,
        user_id: i64,
        request: ProfileUpdateRequest,
    ) -> Result<UserProfile, AccountApiError> {
        let user = self.user(user_id).await?;
        let mut update = UserUpdate { full_name: request.full_name, ..Default::default() };
        if let Some(email) = request.email.as_deref().map(normalize_email) {
            if email != user.email {
                if !is_valid_email(&email) {
                    return Err(AccountApiError::Validation(format!("{email} is not a valid email address")));
                }
                if self.db.fetch_user_by_email(&email).await?.is_some() {
                    return Err(AccountApiError::EmailAlreadyRegistered);
                }
                update.email = Some(email);
            }
        }
        if let Some(new_password) = request.new_password {
            let current = request.current_password.ok_or(AccountApiError::CurrentPasswordRequired)?;
            if new_password.chars().count() < MIN_PASSWORD_LENGTH {
                return Err(AccountApiError::Validation(format!(
                    "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
                )));
            }
            let stored = user.password_hash.clone();
            let hash = tokio::task::spawn_blocking(move || {
                if verify_password(&current, &stored) {
                    hash_password(&new_password).map(Some)
                } else {
                    Ok(None)
                }
            })
            .await
            .map_err(|e| AccountApiError::PasswordError(e.to_string()))??;
            update.password_hash = Some(hash.ok_or(AccountApiError::IncorrectPassword)?);
        }
        if update.is_empty() {
            trace!("👤️ Profile update for user #{user_id} has no changes");
            return Ok(user.into());
        }
        let user = self.db.update_user(user_id, update).await?;
        info!("👤️ Profile for user #{user_id} updated");
        Ok(user.into())
    }

    async fn user(&self, user_id: i64) -> Result<User, AccountApiError> {
        self.db.fetch_user(user_id).await?.ok_or(AccountApiError::UserNotFound(user_id))
    }
}
