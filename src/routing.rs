//! Application router configuration.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    AppState,
    admin::{
        create_store_endpoint, create_user_endpoint, get_user_detail_endpoint,
        list_stores_endpoint, list_users_endpoint, reconcile_store_endpoint,
    },
    change_password::change_password_endpoint,
    dashboard::{admin_dashboard_endpoint, owner_dashboard_endpoint},
    endpoints,
    log_in::log_in,
    logging::logging_middleware,
    rating::submit_rating_endpoint,
    register_user::register_user,
    store::get_stores_endpoint,
};

/// Return a router with all the app's routes.
///
/// Sign-up and log-in are public; every other route requires a bearer token,
/// enforced by the [Claims](crate::auth::Claims) extractor on each handler.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::SIGN_UP, post(register_user))
        .route(endpoints::LOG_IN, post(log_in))
        .route(endpoints::CHANGE_PASSWORD, put(change_password_endpoint))
        .route(endpoints::RATINGS, post(submit_rating_endpoint))
        .route(endpoints::STORES, get(get_stores_endpoint))
        .route(endpoints::OWNER_DASHBOARD, get(owner_dashboard_endpoint))
        .route(endpoints::ADMIN_DASHBOARD, get(admin_dashboard_endpoint))
        .route(
            endpoints::ADMIN_USERS,
            post(create_user_endpoint).get(list_users_endpoint),
        )
        .route(endpoints::ADMIN_USER_DETAIL, get(get_user_detail_endpoint))
        .route(
            endpoints::ADMIN_STORES,
            post(create_store_endpoint).get(list_stores_endpoint),
        )
        .route(
            endpoints::ADMIN_STORE_RECONCILE,
            post(reconcile_store_endpoint),
        )
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}
