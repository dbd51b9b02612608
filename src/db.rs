//! Initializes the application database.

use rusqlite::Connection;

use crate::{
    rating::create_rating_table, store::create_store_table, user::create_user_table,
};

/// Create the tables for the application's domain models.
///
/// Table creation is idempotent, so calling this on an already initialized
/// database is safe.
///
/// # Errors
///
/// This function will return an error if the SQL queries failed, e.g. the
/// database file is corrupt or could not be written to.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    // Foreign keys are off by default in SQLite, and the rating and store
    // tables rely on them.
    connection.pragma_update(None, "foreign_keys", true)?;

    create_user_table(connection)?;
    create_store_table(connection)?;
    create_rating_table(connection)?;

    Ok(())
}
