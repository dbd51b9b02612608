//! The sign-in endpoint that exchanges credentials for an auth token.

use axum::{Json, extract::State};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::encode_token,
    user::{User, UserProfile, get_user_by_email},
};

/// Email and password entered during sign-in.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// Email entered during sign-in.
    pub email: EmailAddress,
    /// Password entered during sign-in.
    pub password: String,
}

/// A successful sign-in: the bearer token and the signed-in user's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogInResponse {
    /// The bearer token to send on subsequent requests.
    pub token: String,
    /// The signed-in user.
    pub user: UserProfile,
}

/// A route handler for sign-in requests.
///
/// An unknown email and a wrong password both produce the same 401 response
/// so that this endpoint cannot be used to probe which emails are registered.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn log_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<LogInResponse>, Error> {
    let user: User = {
        let connection = state.db_connection().lock().unwrap();

        get_user_by_email(&credentials.email, &connection).map_err(|error| match error {
            Error::NotFound => Error::InvalidCredentials,
            error => error,
        })?
    };

    // The lock is released before the deliberately slow bcrypt verification.
    let password_is_correct = user
        .password_hash
        .verify(&credentials.password)
        .map_err(|error| {
            tracing::error!("Error verifying password: {}", error);
            Error::HashingError(error.to_string())
        })?;

    if !password_is_correct {
        return Err(Error::InvalidCredentials);
    }

    let token = encode_token(&user, state.encoding_key())?;

    Ok(Json(LogInResponse {
        token,
        user: user.into(),
    }))
}
