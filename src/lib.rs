//! RateShop is a web app where users discover and rate registered stores,
//! store owners follow how their stores are doing, and admins manage both.
//!
//! This library provides a JSON REST API. Each store row carries a
//! denormalized rating summary that is recomputed in the same transaction as
//! every rating write, so reads never pay for aggregation and the summary
//! can never drift from the rating rows.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

pub mod admin;
mod app_state;
pub mod auth;
pub mod change_password;
pub mod dashboard;
pub mod db;
pub mod endpoints;
mod error;
pub mod log_in;
mod logging;
mod password;
pub mod rating;
pub mod register_user;
mod role;
mod routing;
pub mod store;
pub mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use error::Error;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use password::{PasswordHash, ValidatedPassword};
pub use role::Role;
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
