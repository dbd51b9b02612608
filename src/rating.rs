//! The rating table and the aggregation logic that keeps each store's
//! denormalized rating fields consistent with its rating rows.
//!
//! A user has at most one rating per store, enforced by the composite primary
//! key on `(user_id, store_id)`. Submitting a rating upserts the row and
//! recomputes the store's `overall_rating` and `total_ratings` inside the
//! same SQLite transaction, so a crash between the two writes can never leave
//! the store fields out of sync with the rating rows.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::Claims,
    store::{Store, StoreID, get_store_by_id},
    user::UserID,
};

/// A single user's rating of a single store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// The user who submitted the rating.
    pub user_id: UserID,
    /// The store the rating applies to.
    pub store_id: StoreID,
    /// The score, an integer from 1 to 5.
    pub score: u8,
}

/// Create the rating table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_rating_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS rating (
                user_id INTEGER NOT NULL REFERENCES user(id),
                store_id INTEGER NOT NULL REFERENCES store(id),
                score INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
                PRIMARY KEY (user_id, store_id)
                )",
        (),
    )?;

    Ok(())
}

/// The post-write snapshot returned after a rating submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingResult {
    /// The store the rating applies to.
    pub store_id: StoreID,
    /// The store's mean score after this submission, rounded to 2 decimal
    /// places.
    pub overall_rating: f64,
    /// The store's rating count after this submission.
    pub total_ratings: i64,
    /// The score this user now has on record for the store.
    pub user_rating: u8,
}

/// Round a mean score to 2 decimal places, halves away from zero.
///
/// Scores are positive, so this is round-half-up. Every mean the application
/// reports goes through this function so that stored and freshly computed
/// averages round the same way.
pub fn round_mean(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Recompute a store's `overall_rating` and `total_ratings` from its rating
/// rows and write them back, returning the new values.
///
/// The caller decides the transaction scope: [submit_rating] runs this inside
/// the same transaction as the upsert, [reconcile_store] inside its own.
fn recompute_aggregate(
    store_id: StoreID,
    connection: &Connection,
) -> Result<(Option<f64>, i64), Error> {
    let (total_ratings, mean): (i64, Option<f64>) = connection.query_row(
        "SELECT COUNT(score), AVG(score) FROM rating WHERE store_id = :store_id",
        &[(":store_id", &store_id.as_i64())],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let overall_rating = mean.map(round_mean);

    connection.execute(
        "UPDATE store SET overall_rating = ?1, total_ratings = ?2 WHERE id = ?3",
        (&overall_rating, &total_ratings, &store_id.as_i64()),
    )?;

    Ok((overall_rating, total_ratings))
}

/// Record `score` as `user_id`'s rating of `store_id` and refresh the store's
/// denormalized rating fields.
///
/// A first submission inserts a rating row; a resubmission overwrites the
/// previous score in place, so the `(user_id, store_id)` pair never has more
/// than one row. The upsert and the recompute share one transaction; either
/// both commit or neither does. Resubmitting the same score is a no-op in
/// effect but still runs the full recompute.
///
/// # Errors
///
/// This function will return:
/// - [Error::ScoreOutOfRange] if `score` is not in `1..=5` (checked before
///   any write),
/// - [Error::NotFound] if `store_id` does not belong to a registered store,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn submit_rating(
    user_id: UserID,
    store_id: StoreID,
    score: u8,
    connection: &Connection,
) -> Result<RatingResult, Error> {
    if !(1..=5).contains(&score) {
        return Err(Error::ScoreOutOfRange(score));
    }

    let tx = connection.unchecked_transaction()?;

    // Resolve the store inside the transaction so the row cannot disappear
    // between the check and the writes.
    tx.query_row(
        "SELECT id FROM store WHERE id = :store_id",
        &[(":store_id", &store_id.as_i64())],
        |_| Ok(()),
    )
    .map_err(|error| match error {
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
        error => error.into(),
    })?;

    tx.execute(
        "INSERT INTO rating (user_id, store_id, score) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id, store_id) DO UPDATE SET score = excluded.score",
        (&user_id.as_i64(), &store_id.as_i64(), &score),
    )?;

    let (overall_rating, total_ratings) = recompute_aggregate(store_id, &tx)?;

    tx.commit()?;

    // The store has at least this user's rating, so the mean cannot be null.
    let overall_rating = overall_rating.ok_or(Error::NotFound)?;

    Ok(RatingResult {
        store_id,
        overall_rating,
        total_ratings,
        user_rating: score,
    })
}

/// Rebuild a store's denormalized rating fields from its rating rows.
///
/// The recompute is idempotent, so this doubles as the repair operation for
/// any drift detected between the store row and its ratings.
///
/// # Errors
///
/// Returns [Error::NotFound] if `store_id` does not belong to a registered
/// store, or [Error::SqlError] if an SQL related error occurred.
pub fn reconcile_store(store_id: StoreID, connection: &Connection) -> Result<Store, Error> {
    let tx = connection.unchecked_transaction()?;

    recompute_aggregate(store_id, &tx)?;
    let store = get_store_by_id(store_id, &tx)?;

    tx.commit()?;

    Ok(store)
}

/// Get the rating `user_id` submitted for `store_id`, if any.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user has not rated the store, or
/// [Error::SqlError] if an SQL related error occurred.
pub fn get_rating(
    user_id: UserID,
    store_id: StoreID,
    connection: &Connection,
) -> Result<Rating, Error> {
    connection
        .prepare(
            "SELECT user_id, store_id, score FROM rating
             WHERE user_id = :user_id AND store_id = :store_id",
        )?
        .query_row(
            &[
                (":user_id", &user_id.as_i64()),
                (":store_id", &store_id.as_i64()),
            ],
            |row| {
                Ok(Rating {
                    user_id: UserID::new(row.get(0)?),
                    store_id: StoreID::new(row.get(1)?),
                    score: row.get(2)?,
                })
            },
        )
        .map_err(|error| error.into())
}

/// Get the number of ratings in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_ratings(connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row("SELECT COUNT(score) FROM rating;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

/// The request body for submitting a rating.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRatingRequest {
    /// The store to rate.
    pub store_id: StoreID,
    /// The score, an integer from 1 to 5.
    pub score: u8,
}

/// A route handler for submitting or updating the caller's rating of a store.
///
/// Requires a valid bearer token; any role may rate stores. The rating is
/// always recorded against the authenticated user.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn submit_rating_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<SubmitRatingRequest>,
) -> Result<impl IntoResponse, Error> {
    let connection = state.db_connection().lock().unwrap();
    let result = submit_rating(claims.user_id(), request.store_id, request.score, &connection)?;

    Ok((StatusCode::CREATED, Json(result)))
}

#[cfg(test)]
mod rating_tests {
    use std::str::FromStr;

    use email_address::EmailAddress;
    use rusqlite::Connection;

    use crate::{
        Error, PasswordHash, Role,
        db::initialize,
        store::{NewStore, StoreID, create_store, get_store_by_id},
        user::{NewUser, UserID, create_user},
    };

    use super::{count_ratings, get_rating, reconcile_store, submit_rating};

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        initialize(&conn).expect("Could not initialize database");

        conn
    }

    fn insert_user(email: &str, role: Role, conn: &Connection) -> UserID {
        create_user(
            NewUser {
                name: "Test Person".to_string(),
                email: EmailAddress::from_str(email).unwrap(),
                password_hash: PasswordHash::new_unchecked("hunter2"),
                address: "12 Example Street".to_string(),
                role,
            },
            conn,
        )
        .expect("Could not insert user")
        .id
    }

    fn insert_store(email: &str, conn: &Connection) -> StoreID {
        let owner_id = insert_user(&format!("owner.{email}"), Role::Owner, conn);

        create_store(
            NewStore {
                name: "Corner Shop".to_string(),
                email: EmailAddress::from_str(email).unwrap(),
                address: "34 High Street".to_string(),
                owner_id,
            },
            conn,
        )
        .expect("Could not insert store")
        .id
    }

    fn live_aggregate(store_id: StoreID, conn: &Connection) -> (i64, Option<f64>) {
        conn.query_row(
            "SELECT COUNT(score), AVG(score) FROM rating WHERE store_id = ?1",
            [store_id.as_i64()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap()
    }

    #[test]
    fn resubmission_keeps_a_single_row_with_the_last_score() {
        let conn = get_db_connection();
        let store_id = insert_store("shop@example.com", &conn);
        let user_id = insert_user("rita@example.com", Role::User, &conn);

        submit_rating(user_id, store_id, 3, &conn).unwrap();
        submit_rating(user_id, store_id, 5, &conn).unwrap();
        submit_rating(user_id, store_id, 1, &conn).unwrap();

        assert_eq!(count_ratings(&conn).unwrap(), 1);
        assert_eq!(get_rating(user_id, store_id, &conn).unwrap().score, 1);
    }

    #[test]
    fn store_fields_match_rating_rows_after_any_sequence() {
        let conn = get_db_connection();
        let store_id = insert_store("shop@example.com", &conn);
        let alice = insert_user("alice@example.com", Role::User, &conn);
        let bob = insert_user("bob@example.com", Role::User, &conn);
        let carol = insert_user("carol@example.com", Role::User, &conn);

        submit_rating(alice, store_id, 3, &conn).unwrap();
        submit_rating(bob, store_id, 5, &conn).unwrap();
        submit_rating(alice, store_id, 4, &conn).unwrap();
        submit_rating(carol, store_id, 1, &conn).unwrap();

        let store = get_store_by_id(store_id, &conn).unwrap();
        let (live_count, live_mean) = live_aggregate(store_id, &conn);

        assert_eq!(store.total_ratings, live_count);
        assert_eq!(
            store.overall_rating,
            live_mean.map(|mean| (mean * 100.0).round() / 100.0)
        );
    }

    #[test]
    fn resubmitting_the_same_score_leaves_the_store_row_unchanged() {
        let conn = get_db_connection();
        let store_id = insert_store("shop@example.com", &conn);
        let user_id = insert_user("rita@example.com", Role::User, &conn);

        submit_rating(user_id, store_id, 4, &conn).unwrap();
        let before = get_store_by_id(store_id, &conn).unwrap();

        submit_rating(user_id, store_id, 4, &conn).unwrap();
        let after = get_store_by_id(store_id, &conn).unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn out_of_range_scores_are_rejected_without_state_change() {
        let conn = get_db_connection();
        let store_id = insert_store("shop@example.com", &conn);
        let user_id = insert_user("rita@example.com", Role::User, &conn);

        assert_eq!(
            submit_rating(user_id, store_id, 0, &conn),
            Err(Error::ScoreOutOfRange(0))
        );
        assert_eq!(
            submit_rating(user_id, store_id, 6, &conn),
            Err(Error::ScoreOutOfRange(6))
        );

        assert_eq!(count_ratings(&conn).unwrap(), 0);
        let store = get_store_by_id(store_id, &conn).unwrap();
        assert_eq!(store.overall_rating, None);
        assert_eq!(store.total_ratings, 0);
    }

    #[test]
    fn rating_a_missing_store_fails_without_state_change() {
        let conn = get_db_connection();
        let user_id = insert_user("rita@example.com", Role::User, &conn);

        assert_eq!(
            submit_rating(user_id, StoreID::new(404), 3, &conn),
            Err(Error::NotFound)
        );
        assert_eq!(count_ratings(&conn).unwrap(), 0);
    }

    #[test]
    fn first_rating_then_resubmission_updates_the_mean_in_place() {
        let conn = get_db_connection();
        let store_id = insert_store("shop@example.com", &conn);
        let user_id = insert_user("rita@example.com", Role::User, &conn);

        let store = get_store_by_id(store_id, &conn).unwrap();
        assert_eq!(store.overall_rating, None);
        assert_eq!(store.total_ratings, 0);

        let result = submit_rating(user_id, store_id, 4, &conn).unwrap();
        assert_eq!(result.overall_rating, 4.0);
        assert_eq!(result.total_ratings, 1);
        assert_eq!(result.user_rating, 4);

        let result = submit_rating(user_id, store_id, 2, &conn).unwrap();
        assert_eq!(result.overall_rating, 2.0);
        assert_eq!(result.total_ratings, 1);
    }

    #[test]
    fn a_new_rater_extends_the_mean() {
        let conn = get_db_connection();
        let store_id = insert_store("shop@example.com", &conn);
        let alice = insert_user("alice@example.com", Role::User, &conn);
        let bob = insert_user("bob@example.com", Role::User, &conn);
        let vera = insert_user("vera@example.com", Role::User, &conn);

        submit_rating(alice, store_id, 3, &conn).unwrap();
        submit_rating(bob, store_id, 5, &conn).unwrap();

        let result = submit_rating(vera, store_id, 4, &conn).unwrap();

        assert_eq!(result.overall_rating, 4.0);
        assert_eq!(result.total_ratings, 3);
    }

    #[test]
    fn means_round_half_up_to_two_decimal_places() {
        let conn = get_db_connection();
        let store_id = insert_store("shop@example.com", &conn);

        // Eight scores with mean 1.625, which sits exactly on a rounding
        // boundary and must come out as 1.63.
        for (index, score) in [1, 1, 1, 2, 2, 2, 2, 2].iter().enumerate() {
            let user_id = insert_user(&format!("user{index}@example.com"), Role::User, &conn);
            submit_rating(user_id, store_id, *score, &conn).unwrap();
        }

        let store = get_store_by_id(store_id, &conn).unwrap();
        assert_eq!(store.overall_rating, Some(1.63));

        let conn = get_db_connection();
        let store_id = insert_store("other@example.com", &conn);
        for (index, score) in [4, 5, 5].iter().enumerate() {
            let user_id = insert_user(&format!("user{index}@example.com"), Role::User, &conn);
            submit_rating(user_id, store_id, *score, &conn).unwrap();
        }

        let store = get_store_by_id(store_id, &conn).unwrap();
        assert_eq!(store.overall_rating, Some(4.67));
    }

    #[test]
    fn reconcile_repairs_drifted_store_fields() {
        let conn = get_db_connection();
        let store_id = insert_store("shop@example.com", &conn);
        let alice = insert_user("alice@example.com", Role::User, &conn);
        let bob = insert_user("bob@example.com", Role::User, &conn);

        submit_rating(alice, store_id, 2, &conn).unwrap();
        submit_rating(bob, store_id, 5, &conn).unwrap();

        // Simulate drift, e.g. from a partially applied external write.
        conn.execute(
            "UPDATE store SET overall_rating = 0.0, total_ratings = 99 WHERE id = ?1",
            [store_id.as_i64()],
        )
        .unwrap();

        let store = reconcile_store(store_id, &conn).unwrap();

        assert_eq!(store.overall_rating, Some(3.5));
        assert_eq!(store.total_ratings, 2);
    }

    #[test]
    fn reconcile_resets_a_store_with_no_ratings() {
        let conn = get_db_connection();
        let store_id = insert_store("shop@example.com", &conn);

        conn.execute(
            "UPDATE store SET overall_rating = 4.2, total_ratings = 7 WHERE id = ?1",
            [store_id.as_i64()],
        )
        .unwrap();

        let store = reconcile_store(store_id, &conn).unwrap();

        assert_eq!(store.overall_rating, None);
        assert_eq!(store.total_ratings, 0);
    }

    #[test]
    fn reconcile_fails_for_a_missing_store() {
        let conn = get_db_connection();

        assert_eq!(
            reconcile_store(StoreID::new(404), &conn),
            Err(Error::NotFound)
        );
    }
}
