//! The public sign-up endpoint.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use email_address::EmailAddress;
use serde::Deserialize;

use crate::{
    AppState, Error, PasswordHash, Role,
    user::{NewUser, UserProfile, create_user},
};

/// The request body for creating an account.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    /// The new user's display name.
    pub name: String,
    /// The new user's email address.
    pub email: EmailAddress,
    /// The new user's password in plain text.
    pub password: String,
    /// The new user's postal address.
    pub address: String,
    /// The role to create the account with. Defaults to USER. ADMIN accounts
    /// cannot be self-registered; they are created by another admin or the
    /// `create_admin` command line tool.
    pub role: Option<Role>,
}

/// A route handler for registering a new user account.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, Error> {
    let role = request.role.unwrap_or(Role::User);

    if role == Role::Admin {
        return Err(Error::RoleNotAllowed(Role::Admin));
    }

    // Hash before taking the database lock, bcrypt is deliberately slow.
    let password_hash =
        PasswordHash::from_raw_password(&request.password, PasswordHash::DEFAULT_COST)?;

    let connection = state.db_connection().lock().unwrap();
    let user = create_user(
        NewUser {
            name: request.name,
            email: request.email,
            password_hash,
            address: request.address,
            role,
        },
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}
