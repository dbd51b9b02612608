//! The app level error type and its conversion to JSON HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::user::UserID;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request did not carry a valid bearer token.
    #[error("a valid bearer token is required")]
    Unauthenticated,

    /// The user provided an invalid combination of email and password.
    ///
    /// A wrong email and a wrong password produce the same error so that a
    /// caller cannot probe which email addresses are registered.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The authenticated user's role does not grant access to this resource.
    #[error("access denied")]
    Forbidden,

    /// A rating score outside the accepted 1-5 range.
    #[error("score {0} is out of range, must be between 1 and 5")]
    ScoreOutOfRange(u8),

    /// A string that does not name one of the three roles.
    #[error("\"{0}\" is not a valid role")]
    InvalidRole(String),

    /// The role cannot be chosen at self-registration (i.e., ADMIN).
    #[error("accounts with the {0} role cannot be self-registered")]
    RoleNotAllowed(crate::Role),

    /// The user given as a store owner does not exist or is not an OWNER.
    #[error("user {0} cannot own a store")]
    NotAnOwner(UserID),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An auth token could not be created for a signed-in user.
    #[error("could not create an auth token")]
    TokenCreation,

    /// The email already belongs to a registered user or store. The client
    /// should try again with a different email address.
    #[error("the email is already in use")]
    DuplicateEmail,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A query was given an invalid foreign key. The client should check that
    /// the ids are valid.
    #[error("a referenced row does not exist")]
    InvalidForeignKey,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(_)) if sql_error.extended_code == 787 => {
                Error::InvalidForeignKey
            }
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            Error::Unauthenticated | Error::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            Error::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            Error::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Error::DuplicateEmail => (StatusCode::CONFLICT, self.to_string()),
            Error::ScoreOutOfRange(_)
            | Error::InvalidRole(_)
            | Error::RoleNotAllowed(_)
            | Error::NotAnOwner(_)
            | Error::TooWeak(_)
            | Error::InvalidForeignKey => (StatusCode::BAD_REQUEST, self.to_string()),
            // Anything else is an internal fault whose details stay in the server logs.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
