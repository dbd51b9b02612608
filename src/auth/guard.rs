//! Role and ownership checks that run before any operation touches state.
//!
//! A denied check always yields [Error::Forbidden], never a not-found
//! response, so a caller cannot use a gated endpoint to probe whether a
//! restricted resource exists.

use crate::{Error, Role, user::UserID};

use super::Claims;

/// Require the authenticated identity to hold `role`.
///
/// Admins pass every role requirement: an admin invoking an owner-gated
/// operation sees the operation scoped to their own (typically empty) data
/// rather than a denial.
///
/// # Errors
///
/// Returns [Error::Forbidden] if the identity holds neither `role` nor ADMIN.
pub fn require_role(claims: &Claims, role: Role) -> Result<(), Error> {
    if claims.role == role || claims.role == Role::Admin {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

/// Require the authenticated identity to be the user identified by `target`.
///
/// Used for operations that act on a single user's own row, such as changing
/// a password. Holding the ADMIN role does not bypass this check; admin
/// operations on other users go through their own endpoints.
///
/// # Errors
///
/// Returns [Error::Forbidden] if `target` is another user.
pub fn require_self(claims: &Claims, target: UserID) -> Result<(), Error> {
    if claims.user_id() == target {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}
