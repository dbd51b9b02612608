//! Code for creating the user table and creating, fetching and updating users.

use std::fmt::Display;

use email_address::EmailAddress;
use rusqlite::{Connection, Row, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash, Role};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered account, either a rating user, a store owner or an admin.
///
/// Holds the password hash, so this type stays internal. API responses use
/// [UserProfile] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's display name.
    pub name: String,
    /// The user's email address, unique across all users.
    pub email: EmailAddress,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The user's postal address.
    pub address: String,
    /// The user's role, fixed at creation.
    pub role: Role,
}

/// The data needed to insert a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// The user's display name.
    pub name: String,
    /// The user's email address, must not belong to an existing user.
    pub email: EmailAddress,
    /// The hash of the user's password.
    pub password_hash: PasswordHash,
    /// The user's postal address.
    pub address: String,
    /// The role the account is created with.
    pub role: Role,
}

/// The public view of a user, safe to serialize into API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's display name.
    pub name: String,
    /// The user's email address.
    pub email: EmailAddress,
    /// The user's postal address.
    pub address: String,
    /// The user's role.
    pub role: Role,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            address: user.address,
            role: user.role,
        }
    }
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL,
                address TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('ADMIN', 'OWNER', 'USER'))
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns [Error::DuplicateEmail] if a user with the same email already
/// exists, or [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (name, email, password, address, role) VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &new_user.name,
            &new_user.email.to_string(),
            &new_user.password_hash.to_string(),
            &new_user.address,
            &new_user.role,
        ),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        name: new_user.name,
        email: new_user.email,
        password_hash: new_user.password_hash,
        address: new_user.address,
        role: new_user.role,
    })
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_email: String = row.get("email")?;
    let raw_password_hash: String = row.get("password")?;

    Ok(User {
        id: UserID::new(row.get("id")?),
        name: row.get("name")?,
        email: EmailAddress::new_unchecked(raw_email),
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        address: row.get("address")?,
        role: row.get("role")?,
    })
}

const USER_COLUMNS: &str = "id, name, email, password, address, role";

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user from the database with an email equal to `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the given email, or
/// [Error::SqlError] if an SQL related error occurred.
pub fn get_user_by_email(email: &EmailAddress, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE email = :email"
        ))?
        .query_row(&[(":email", &email.to_string())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

/// Overwrite the password hash stored for `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered
/// user, or [Error::SqlError] if an SQL related error occurred.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (&password_hash.to_string(), &user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Optional filters for listing users.
///
/// Text filters match case-insensitive substrings, the role filter matches
/// exactly.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UserQuery {
    /// Match users whose name contains this string.
    pub name: Option<String>,
    /// Match users whose email contains this string.
    pub email: Option<String>,
    /// Match users whose address contains this string.
    pub address: Option<String>,
    /// Match users with exactly this role.
    pub role: Option<Role>,
}

/// Query for users in the database, ordered by name.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is a SQL error.
pub fn query_users(filter: &UserQuery, connection: &Connection) -> Result<Vec<User>, Error> {
    let mut query_string_parts = vec![format!("SELECT {USER_COLUMNS} FROM user")];
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

    if let Some(role) = filter.role {
        where_clause_parts.push(format!("role = ?{}", query_parameters.len() + 1));
        query_parameters.push(Value::Text(role.as_str().to_string()));
    }

    if !where_clause_parts.is_empty() {
        query_string_parts.push(String::from("WHERE ") + &where_clause_parts.join(" AND "));
    }

    query_string_parts.push("ORDER BY name ASC".to_string());

    let query_string = query_string_parts.join(" ");
    let params = params_from_iter(query_parameters.iter());

    connection
        .prepare(&query_string)?
        .query_map(params, map_user_row)?
        .map(|maybe_user| maybe_user.map_err(Error::SqlError))
        .collect()
}
