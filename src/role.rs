//! The three account roles and their SQL/JSON representations.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// The role assigned to a user account when it is created.
///
/// Roles are immutable after creation. A role change requires creating a new
/// account (and re-issuing any auth tokens, since tokens embed the role).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// May manage users and stores and view the global dashboard.
    Admin,
    /// Owns stores and may view the dashboard aggregating their ratings.
    Owner,
    /// May browse stores and submit one rating per store.
    User,
}

impl Role {
    /// The role's canonical upper-case name, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Owner => "OWNER",
            Role::User => "USER",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::Error;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string {
            "ADMIN" => Ok(Role::Admin),
            "OWNER" => Ok(Role::Owner),
            "USER" => Ok(Role::User),
            other => Err(crate::Error::InvalidRole(other.to_string())),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}
