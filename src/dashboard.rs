//! Read-side dashboards: global counts for admins and per-owner rating
//! summaries. Nothing here mutates state.

use axum::{Json, extract::State};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, Role,
    auth::{Claims, require_role},
    rating::{count_ratings, round_mean},
    store::count_stores,
    user::{UserID, UserProfile, count_users},
};

/// The global counts shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminDashboard {
    /// The number of registered users, all roles included.
    pub total_users: i64,
    /// The number of registered stores.
    pub total_stores: i64,
    /// The number of submitted ratings.
    pub total_ratings: i64,
}

/// The summary shown to a store owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerDashboard {
    /// The number of stores the owner owns.
    pub total_stores: i64,
    /// The mean score across every rating of the owner's stores, rounded to
    /// 2 decimal places, or `None` while none of their stores has a rating.
    pub average_rating: Option<f64>,
    /// The distinct users who have rated at least one of the owner's stores,
    /// ordered by name.
    pub raters: Vec<UserProfile>,
}

/// The mean score across all ratings of all stores owned by `owner_id`.
///
/// Computed fresh from the rating rows rather than folding the per-store
/// denormalized means, which would accumulate double-rounding error.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn owner_average_rating(
    owner_id: UserID,
    connection: &Connection,
) -> Result<Option<f64>, Error> {
    let mean: Option<f64> = connection.query_row(
        "SELECT AVG(score) FROM rating
         JOIN store ON store.id = rating.store_id
         WHERE store.owner_id = :owner_id",
        &[(":owner_id", &owner_id.as_i64())],
        |row| row.get(0),
    )?;

    Ok(mean.map(round_mean))
}

/// Build the dashboard summary for the stores owned by `owner_id`.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn owner_dashboard_summary(
    owner_id: UserID,
    connection: &Connection,
) -> Result<OwnerDashboard, Error> {
    let total_stores: i64 = connection.query_row(
        "SELECT COUNT(id) FROM store WHERE owner_id = :owner_id",
        &[(":owner_id", &owner_id.as_i64())],
        |row| row.get(0),
    )?;

    let average_rating = owner_average_rating(owner_id, connection)?;

    let raters = connection
        .prepare(
            "SELECT DISTINCT u.id, u.name, u.email, u.address, u.role
             FROM user u
             JOIN rating r ON r.user_id = u.id
             JOIN store s ON s.id = r.store_id
             WHERE s.owner_id = :owner_id
             ORDER BY u.name ASC",
        )?
        .query_map(&[(":owner_id", &owner_id.as_i64())], |row| {
            let raw_email: String = row.get("email")?;

            Ok(UserProfile {
                id: UserID::new(row.get("id")?),
                name: row.get("name")?,
                email: email_address::EmailAddress::new_unchecked(raw_email),
                address: row.get("address")?,
                role: row.get("role")?,
            })
        })?
        .map(|maybe_profile| maybe_profile.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OwnerDashboard {
        total_stores,
        average_rating,
        raters,
    })
}

/// A route handler for the admin dashboard's global counts.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn admin_dashboard_endpoint(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<AdminDashboard>, Error> {
    require_role(&claims, Role::Admin)?;

    let connection = state.db_connection().lock().unwrap();

    Ok(Json(AdminDashboard {
        total_users: count_users(&connection)?,
        total_stores: count_stores(&connection)?,
        total_ratings: count_ratings(&connection)?,
    }))
}

/// A route handler for the owner dashboard.
///
/// The summary always covers the authenticated caller's own stores; there is
/// no way to request another owner's summary.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn owner_dashboard_endpoint(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<OwnerDashboard>, Error> {
    require_role(&claims, Role::Owner)?;

    let connection = state.db_connection().lock().unwrap();
    let summary = owner_dashboard_summary(claims.user_id(), &connection)?;

    Ok(Json(summary))
}
