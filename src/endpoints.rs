//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/admin/users/{user_id}',
//! use [format_endpoint].

/// The route for registering a new account.
pub const SIGN_UP: &str = "/api/sign_up";
/// The route for exchanging credentials for an auth token.
pub const LOG_IN: &str = "/api/log_in";
/// The route for changing the caller's own password.
pub const CHANGE_PASSWORD: &str = "/api/users/password";
/// The route for submitting or updating the caller's rating of a store.
pub const RATINGS: &str = "/api/ratings";
/// The route for the store listing shown to signed-in users.
pub const STORES: &str = "/api/stores";
/// The route for the store owner's dashboard.
pub const OWNER_DASHBOARD: &str = "/api/owner/dashboard";
/// The route for the admin dashboard's global counts.
pub const ADMIN_DASHBOARD: &str = "/api/admin/dashboard";
/// The route for admins to create and list users.
pub const ADMIN_USERS: &str = "/api/admin/users";
/// The route for admins to view a single user.
pub const ADMIN_USER_DETAIL: &str = "/api/admin/users/{user_id}";
/// The route for admins to create and list stores.
pub const ADMIN_STORES: &str = "/api/admin/stores";
/// The route for admins to rebuild a store's denormalized rating fields.
pub const ADMIN_STORE_RECONCILE: &str = "/api/admin/stores/{store_id}/reconcile";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/admin/users/{user_id}',
/// '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
