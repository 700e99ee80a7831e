pub mod accounts;
pub mod auth;
pub mod categories;
pub mod health;
pub mod pages;
pub mod stats;
pub mod transactions;
pub mod webhook;

use crate::auth::AuthUser;
use crate::error::ApiError;

/// Fails with 403 unless `owner_id` is the authenticated user.
pub(crate) fn ensure_owner(user: &AuthUser, owner_id: i32, what: &str) -> Result<(), ApiError> {
    if owner_id == user.id {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("无权访问此{what}")))
    }
}
