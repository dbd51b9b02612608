//! Code for creating the store table, registering stores and listing them.
//!
//! A store row carries two denormalized fields, `overall_rating` and
//! `total_ratings`, that mirror the aggregate of its rating rows. They are
//! kept in sync by [crate::rating::submit_rating] and can be rebuilt with
//! [crate::rating::reconcile_store].

use std::fmt::Display;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use email_address::EmailAddress;
use rusqlite::{Connection, Row, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, Role,
    auth::Claims,
    user::{UserID, get_user_by_id},
};

/// A newtype wrapper for integer store IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct StoreID(i64);

impl StoreID {
    /// Create a new store ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the store ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for StoreID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered store that users can rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    /// The store's ID in the application database.
    pub id: StoreID,
    /// The store's display name.
    pub name: String,
    /// The store's contact email, unique across all stores.
    pub email: EmailAddress,
    /// The store's street address.
    pub address: String,
    /// The user that owns this store. Always a user with the OWNER role.
    pub owner_id: UserID,
    /// The mean of the store's rating scores rounded to 2 decimal places, or
    /// `None` while the store has no ratings.
    pub overall_rating: Option<f64>,
    /// The number of ratings submitted for this store.
    pub total_ratings: i64,
}

/// The data needed to register a new store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStore {
    /// The store's display name.
    pub name: String,
    /// The store's contact email, must not belong to an existing store.
    pub email: EmailAddress,
    /// The store's street address.
    pub address: String,
    /// The user that will own the store. Must have the OWNER role.
    pub owner_id: UserID,
}

/// Create the store table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_store_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS store (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                address TEXT NOT NULL,
                owner_id INTEGER NOT NULL REFERENCES user(id),
                overall_rating REAL,
                total_ratings INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

fn map_store_row(row: &Row) -> Result<Store, rusqlite::Error> {
    let raw_email: String = row.get("email")?;

    Ok(Store {
        id: StoreID::new(row.get("id")?),
        name: row.get("name")?,
        email: EmailAddress::new_unchecked(raw_email),
        address: row.get("address")?,
        owner_id: UserID::new(row.get("owner_id")?),
        overall_rating: row.get("overall_rating")?,
        total_ratings: row.get("total_ratings")?,
    })
}

const STORE_COLUMNS: &str = "id, name, email, address, owner_id, overall_rating, total_ratings";

/// Create and insert a new store into the database.
///
/// The new store starts out unrated: `overall_rating` is null and
/// `total_ratings` is zero.
///
/// # Errors
///
/// This function will return:
/// - [Error::NotAnOwner] if `owner_id` does not belong to a user with the
///   OWNER role,
/// - [Error::DuplicateEmail] if a store with the same email already exists,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn create_store(new_store: NewStore, connection: &Connection) -> Result<Store, Error> {
    let owner = match get_user_by_id(new_store.owner_id, connection) {
        Ok(owner) => owner,
        Err(Error::NotFound) => return Err(Error::NotAnOwner(new_store.owner_id)),
        Err(error) => return Err(error),
    };

    if owner.role != Role::Owner {
        return Err(Error::NotAnOwner(new_store.owner_id));
    }

    connection.execute(
        "INSERT INTO store (name, email, address, owner_id) VALUES (?1, ?2, ?3, ?4)",
        (
            &new_store.name,
            &new_store.email.to_string(),
            &new_store.address,
            &new_store.owner_id.as_i64(),
        ),
    )?;

    let id = StoreID::new(connection.last_insert_rowid());

    Ok(Store {
        id,
        name: new_store.name,
        email: new_store.email,
        address: new_store.address,
        owner_id: new_store.owner_id,
        overall_rating: None,
        total_ratings: 0,
    })
}

/// Get the store from the database with an ID equal to `store_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `store_id` does not belong to a registered
/// store, or [Error::SqlError] if an SQL related error occurred.
pub fn get_store_by_id(store_id: StoreID, connection: &Connection) -> Result<Store, Error> {
    connection
        .prepare(&format!("SELECT {STORE_COLUMNS} FROM store WHERE id = :id"))?
        .query_row(&[(":id", &store_id.as_i64())], map_store_row)
        .map_err(|error| error.into())
}

/// Get the number of stores in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_stores(connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM store;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

/// Optional case-insensitive substring filters for listing stores.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StoreQuery {
    /// Match stores whose name contains this string.
    pub name: Option<String>,
    /// Match stores whose email contains this string.
    pub email: Option<String>,
    /// Match stores whose address contains this string.
    pub address: Option<String>,
}

/// Query for stores in the database, ordered by name.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is a SQL error.
pub fn query_stores(filter: &StoreQuery, connection: &Connection) -> Result<Vec<Store>, Error> {
    let mut query_string_parts = vec![format!("SELECT {STORE_COLUMNS} FROM store")];
    let mut where_clause_parts = vec![];
    let mut query_parameters = vec![];

    for (column, pattern) in [
        ("name", &filter.name),
        ("email", &filter.email),
        ("address", &filter.address),
    ] {
        if let Some(pattern) = pattern {
            where_clause_parts.push(format!(
                "{column} LIKE '%' || ?{} || '%'",
                query_parameters.len() + 1
            ));
            query_parameters.push(Value::Text(pattern.to_string()));
        }
    }

    if !where_clause_parts.is_empty() {
        query_string_parts.push(String::from("WHERE ") + &where_clause_parts.join(" AND "));
    }

    query_string_parts.push("ORDER BY name ASC".to_string());

    let query_string = query_string_parts.join(" ");
    let params = params_from_iter(query_parameters.iter());

    connection
        .prepare(&query_string)?
        .query_map(params, map_store_row)?
        .map(|maybe_store| maybe_store.map_err(Error::SqlError))
        .collect()
}

/// One row of the store listing shown to rating users.
///
/// `overall_rating` and `total_ratings` come from the store's denormalized
/// fields, and `user_rating` is the score the viewing user gave this store,
/// if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// The store's ID in the application database.
    pub id: StoreID,
    /// The store's display name.
    pub name: String,
    /// The store's street address.
    pub address: String,
    /// The mean rating score rounded to 2 decimal places, or `None` while the
    /// store has no ratings. Never zero for an unrated store.
    pub overall_rating: Option<f64>,
    /// The number of ratings submitted for this store.
    pub total_ratings: i64,
    /// The score the viewing user gave this store, or `None` if they have not
    /// rated it yet.
    pub user_rating: Option<u8>,
}

/// The name/address filter accepted by the store listing endpoint.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StoreFilter {
    /// Match stores whose name contains this string.
    pub name: Option<String>,
    /// Match stores whose address contains this string.
    pub address: Option<String>,
}

/// List stores matching `filter` as seen by `user_id`, ordered by name.
///
/// Each row includes the viewing user's own rating so the client can render
/// "your rating" next to the overall one. The viewing user's identity comes
/// from the verified token, never from request parameters.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is a SQL error.
pub fn list_stores_for_user(
    user_id: UserID,
    filter: &StoreFilter,
    connection: &Connection,
) -> Result<Vec<StoreSummary>, Error> {
    let mut query_string_parts = vec![
        "SELECT s.id, s.name, s.address, s.overall_rating, s.total_ratings, r.score AS user_rating
         FROM store s
         LEFT JOIN rating r ON r.store_id = s.id AND r.user_id = ?1"
            .to_string(),
    ];
    let mut where_clause_parts = vec![];
    let mut query_parameters = vec![Value::Integer(user_id.as_i64())];

    for (column, pattern) in [("s.name", &filter.name), ("s.address", &filter.address)] {
        if let Some(pattern) = pattern {
            where_clause_parts.push(format!(
                "{column} LIKE '%' || ?{} || '%'",
                query_parameters.len() + 1
            ));
            query_parameters.push(Value::Text(pattern.to_string()));
        }
    }

    if !where_clause_parts.is_empty() {
        query_string_parts.push(String::from("WHERE ") + &where_clause_parts.join(" AND "));
    }

    query_string_parts.push("ORDER BY s.name ASC".to_string());

    let query_string = query_string_parts.join(" ");
    let params = params_from_iter(query_parameters.iter());

    connection
        .prepare(&query_string)?
        .query_map(params, |row| {
            Ok(StoreSummary {
                id: StoreID::new(row.get("id")?),
                name: row.get("name")?,
                address: row.get("address")?,
                overall_rating: row.get("overall_rating")?,
                total_ratings: row.get("total_ratings")?,
                user_rating: row.get("user_rating")?,
            })
        })?
        .map(|maybe_summary| maybe_summary.map_err(Error::SqlError))
        .collect()
}

/// A route handler for the store listing shown to signed-in users.
///
/// Requires a valid bearer token; any role may browse stores.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_stores_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(filter): Query<StoreFilter>,
) -> Result<impl IntoResponse, Error> {
    let connection = state.db_connection().lock().unwrap();
    let summaries = list_stores_for_user(claims.user_id(), &filter, &connection)?;

    Ok(Json(summaries))
}
