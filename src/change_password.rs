//! The endpoint for changing the caller's own password.
//!
//! The request body is `{current_password, new_password}`; the target row is
//! always the authenticated caller's own user row, whatever their role.

use axum::{Json, extract::State, http::StatusCode};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error, PasswordHash,
    auth::{Claims, require_self},
    user::{UserID, get_user_by_id, update_password},
};

/// The request body for changing a password.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    /// The caller's current password, verified before anything is changed.
    pub current_password: String,
    /// The replacement password in plain text.
    pub new_password: String,
}

/// Verify `claims` may change `target`'s password, check the current
/// password, then store the hash of the new one.
///
/// # Errors
///
/// This function will return:
/// - [Error::Forbidden] if `target` is not the authenticated user,
/// - [Error::InvalidCredentials] if the current password is wrong,
/// - [Error::TooWeak] if the new password fails the strength check,
/// - or an error fetching or updating the user row.
pub fn change_user_password(
    claims: &Claims,
    target: UserID,
    request: &ChangePasswordRequest,
    connection: &Connection,
) -> Result<(), Error> {
    require_self(claims, target)?;

    let user = get_user_by_id(target, connection)?;

    let current_is_correct = user
        .password_hash
        .verify(&request.current_password)
        .map_err(|error| {
            tracing::error!("Error verifying password: {}", error);
            Error::HashingError(error.to_string())
        })?;

    if !current_is_correct {
        return Err(Error::InvalidCredentials);
    }

    let password_hash =
        PasswordHash::from_raw_password(&request.new_password, PasswordHash::DEFAULT_COST)?;

    update_password(target, &password_hash, connection)
}

/// A route handler for changing the caller's own password.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn change_password_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, Error> {
    let connection = state.db_connection().lock().unwrap();
    change_user_password(&claims, claims.user_id(), &request, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
