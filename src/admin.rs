//! Admin-only management endpoints: creating users and stores, listing and
//! inspecting them, and repairing a store's denormalized rating fields.
//!
//! Every handler checks the ADMIN role before touching any state, so a
//! non-admin caller always gets a 403 and learns nothing about whether the
//! resource they asked for exists.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, PasswordHash, Role,
    auth::{Claims, require_role},
    dashboard::owner_average_rating,
    rating::reconcile_store,
    store::{NewStore, Store, StoreID, StoreQuery, create_store, query_stores},
    user::{
        NewUser, UserID, UserProfile, UserQuery, create_user, get_user_by_id, query_users,
    },
};

/// The request body for an admin creating a user with any role.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminNewUserRequest {
    /// The new user's display name.
    pub name: String,
    /// The new user's email address.
    pub email: EmailAddress,
    /// The new user's password in plain text.
    pub password: String,
    /// The new user's postal address.
    pub address: String,
    /// The role to create the account with. Unlike public sign-up, ADMIN is
    /// allowed here.
    pub role: Role,
}

/// A user profile as shown to an admin, with rating statistics attached for
/// store owners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetail {
    /// The user's profile.
    #[serde(flatten)]
    pub profile: UserProfile,
    /// For OWNER targets, the mean score across all ratings of their stores
    /// rounded to 2 decimal places (inner `None` while unrated). Omitted
    /// entirely for other roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<Option<f64>>,
}

/// A route handler for an admin creating a user account with any role.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn create_user_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<AdminNewUserRequest>,
) -> Result<impl IntoResponse, Error> {
    require_role(&claims, Role::Admin)?;

    let password_hash =
        PasswordHash::from_raw_password(&request.password, PasswordHash::DEFAULT_COST)?;

    let connection = state.db_connection().lock().unwrap();
    let user = create_user(
        NewUser {
            name: request.name,
            email: request.email,
            password_hash,
            address: request.address,
            role: request.role,
        },
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

/// A route handler for listing users, with optional name/email/address/role
/// filters.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn list_users_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(filter): Query<UserQuery>,
) -> Result<Json<Vec<UserProfile>>, Error> {
    require_role(&claims, Role::Admin)?;

    let connection = state.db_connection().lock().unwrap();
    let users = query_users(&filter, &connection)?;

    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// A route handler for viewing a single user.
///
/// For targets with the OWNER role the response carries the mean rating
/// across all stores they own, computed fresh with the same formula as the
/// owner dashboard.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_user_detail_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<UserID>,
) -> Result<Json<UserDetail>, Error> {
    require_role(&claims, Role::Admin)?;

    let connection = state.db_connection().lock().unwrap();
    let user = get_user_by_id(user_id, &connection)?;

    let average_rating = if user.role == Role::Owner {
        Some(owner_average_rating(user.id, &connection)?)
    } else {
        None
    };

    Ok(Json(UserDetail {
        profile: user.into(),
        average_rating,
    }))
}

/// A route handler for an admin registering a new store.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn create_store_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Json(new_store): Json<NewStore>,
) -> Result<impl IntoResponse, Error> {
    require_role(&claims, Role::Admin)?;

    let connection = state.db_connection().lock().unwrap();
    let store = create_store(new_store, &connection)?;

    Ok((StatusCode::CREATED, Json(store)))
}

/// A route handler for listing stores with their denormalized rating fields,
/// with optional name/email/address filters.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn list_stores_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(filter): Query<StoreQuery>,
) -> Result<Json<Vec<Store>>, Error> {
    require_role(&claims, Role::Admin)?;

    let connection = state.db_connection().lock().unwrap();
    let stores = query_stores(&filter, &connection)?;

    Ok(Json(stores))
}

/// A route handler for rebuilding a store's denormalized rating fields from
/// its rating rows, for recovering from detected drift.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn reconcile_store_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Path(store_id): Path<StoreID>,
) -> Result<Json<Store>, Error> {
    require_role(&claims, Role::Admin)?;

    let connection = state.db_connection().lock().unwrap();
    let store = reconcile_store(store_id, &connection)?;

    Ok(Json(store))
}

#[cfg(test)]
mod admin_tests {
    use std::str::FromStr;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use email_address::EmailAddress;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        AppState, PasswordHash, Role, build_router,
        auth::encode_token,
        endpoints::{self, format_endpoint},
        rating::submit_rating,
        store::{NewStore, Store, StoreID, create_store, get_store_by_id},
        user::{NewUser, User, UserProfile, create_user},
    };

    use super::UserDetail;

    fn get_test_state() -> AppState {
        let db_connection =
            Connection::open_in_memory().expect("Could not open database in memory.");

        AppState::new(db_connection, "42").expect("Could not create app state.")
    }

    fn seed_user(state: &AppState, name: &str, email: &str, role: Role) -> (User, String) {
        let user = create_user(
            NewUser {
                name: name.to_string(),
                email: EmailAddress::from_str(email).unwrap(),
                password_hash: PasswordHash::new_unchecked("hunter2"),
                address: "12 Example Street".to_string(),
                role,
            },
            &state.db_connection().lock().unwrap(),
        )
        .expect("Could not seed user");

        let token = encode_token(&user, state.encoding_key()).expect("Could not encode token");

        (user, token)
    }

    fn seed_store(state: &AppState, name: &str, email: &str, owner: &User) -> StoreID {
        create_store(
            NewStore {
                name: name.to_string(),
                email: EmailAddress::from_str(email).unwrap(),
                address: "34 High Street".to_string(),
                owner_id: owner.id,
            },
            &state.db_connection().lock().unwrap(),
        )
        .expect("Could not seed store")
        .id
    }

    fn get_test_server(state: AppState) -> TestServer {
        TestServer::new(build_router(state))
    }

    #[tokio::test]
    async fn a_regular_user_cannot_view_user_details() {
        let state = get_test_state();
        let (admin, _) = seed_user(&state, "Ada", "ada@example.com", Role::Admin);
        let (_, user_token) = seed_user(&state, "Rita", "rita@example.com", Role::User);
        let server = get_test_server(state);

        server
            .get(&format_endpoint(
                endpoints::ADMIN_USER_DETAIL,
                admin.id.as_i64(),
            ))
            .authorization_bearer(&user_token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn user_detail_for_an_owner_includes_their_average_rating() {
        let state = get_test_state();
        let (_, admin_token) = seed_user(&state, "Ada", "ada@example.com", Role::Admin);
        let (owner, _) = seed_user(&state, "Olive", "olive@example.com", Role::Owner);
        let (alice, _) = seed_user(&state, "Alice", "alice@example.com", Role::User);
        let (bob, _) = seed_user(&state, "Bob", "bob@example.com", Role::User);

        let store_x = seed_store(&state, "Store X", "x@example.com", &owner);
        let store_y = seed_store(&state, "Store Y", "y@example.com", &owner);
        {
            let connection = state.db_connection().lock().unwrap();
            submit_rating(alice.id, store_x, 3, &connection).unwrap();
            submit_rating(bob.id, store_x, 5, &connection).unwrap();
            submit_rating(alice.id, store_y, 1, &connection).unwrap();
        }

        let server = get_test_server(state);
        let response = server
            .get(&format_endpoint(
                endpoints::ADMIN_USER_DETAIL,
                owner.id.as_i64(),
            ))
            .authorization_bearer(&admin_token)
            .await;

        response.assert_status_ok();
        let detail = response.json::<UserDetail>();
        assert_eq!(detail.profile.role, Role::Owner);
        assert_eq!(detail.average_rating, Some(Some(3.0)));
    }

    #[tokio::test]
    async fn user_detail_for_a_regular_user_omits_the_average() {
        let state = get_test_state();
        let (_, admin_token) = seed_user(&state, "Ada", "ada@example.com", Role::Admin);
        let (user, _) = seed_user(&state, "Rita", "rita@example.com", Role::User);
        let server = get_test_server(state);

        let response = server
            .get(&format_endpoint(
                endpoints::ADMIN_USER_DETAIL,
                user.id.as_i64(),
            ))
            .authorization_bearer(&admin_token)
            .await;

        response.assert_status_ok();
        assert!(!response.text().contains("average_rating"));
    }

    #[tokio::test]
    async fn user_detail_for_an_unknown_user_is_not_found() {
        let state = get_test_state();
        let (_, admin_token) = seed_user(&state, "Ada", "ada@example.com", Role::Admin);
        let server = get_test_server(state);

        server
            .get(&format_endpoint(endpoints::ADMIN_USER_DETAIL, 404))
            .authorization_bearer(&admin_token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn an_admin_can_create_admin_accounts() {
        let state = get_test_state();
        let (_, admin_token) = seed_user(&state, "Ada", "ada@example.com", Role::Admin);
        let server = get_test_server(state);

        let response = server
            .post(endpoints::ADMIN_USERS)
            .authorization_bearer(&admin_token)
            .content_type("application/json")
            .json(&json!({
                "name": "Second Admin",
                "email": "admin2@example.com",
                "password": "averysafeandsecurepassword",
                "address": "1 Admin Road",
                "role": "ADMIN",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<UserProfile>().role, Role::Admin);
    }

    #[tokio::test]
    async fn an_owner_cannot_create_users() {
        let state = get_test_state();
        let (_, owner_token) = seed_user(&state, "Olive", "olive@example.com", Role::Owner);
        let server = get_test_server(state);

        server
            .post(endpoints::ADMIN_USERS)
            .authorization_bearer(&owner_token)
            .content_type("application/json")
            .json(&json!({
                "name": "Sneaky",
                "email": "sneaky@example.com",
                "password": "averysafeandsecurepassword",
                "address": "1 Side Street",
                "role": "ADMIN",
            }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn listing_users_can_filter_by_role() {
        let state = get_test_state();
        let (_, admin_token) = seed_user(&state, "Ada", "ada@example.com", Role::Admin);
        seed_user(&state, "Olive", "olive@example.com", Role::Owner);
        seed_user(&state, "Rita", "rita@example.com", Role::User);
        let server = get_test_server(state);

        let response = server
            .get(endpoints::ADMIN_USERS)
            .add_query_param("role", "OWNER")
            .authorization_bearer(&admin_token)
            .await;

        response.assert_status_ok();
        let users = response.json::<Vec<UserProfile>>();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Olive");
    }

    #[tokio::test]
    async fn an_admin_can_register_a_store() {
        let state = get_test_state();
        let (_, admin_token) = seed_user(&state, "Ada", "ada@example.com", Role::Admin);
        let (owner, _) = seed_user(&state, "Olive", "olive@example.com", Role::Owner);
        let server = get_test_server(state);

        let response = server
            .post(endpoints::ADMIN_STORES)
            .authorization_bearer(&admin_token)
            .content_type("application/json")
            .json(&json!({
                "name": "Corner Shop",
                "email": "shop@example.com",
                "address": "34 High Street",
                "owner_id": owner.id,
            }))
            .await;

        response.assert_status(StatusCode::CREATED);

        let store = response.json::<Store>();
        assert_eq!(store.owner_id, owner.id);
        assert_eq!(store.overall_rating, None);
        assert_eq!(store.total_ratings, 0);
    }

    #[tokio::test]
    async fn registering_a_store_with_a_non_owner_fails() {
        let state = get_test_state();
        let (_, admin_token) = seed_user(&state, "Ada", "ada@example.com", Role::Admin);
        let (user, _) = seed_user(&state, "Rita", "rita@example.com", Role::User);
        let server = get_test_server(state);

        server
            .post(endpoints::ADMIN_STORES)
            .authorization_bearer(&admin_token)
            .content_type("application/json")
            .json(&json!({
                "name": "Corner Shop",
                "email": "shop@example.com",
                "address": "34 High Street",
                "owner_id": user.id,
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listing_stores_includes_rating_fields() {
        let state = get_test_state();
        let (_, admin_token) = seed_user(&state, "Ada", "ada@example.com", Role::Admin);
        let (owner, _) = seed_user(&state, "Olive", "olive@example.com", Role::Owner);
        let (alice, _) = seed_user(&state, "Alice", "alice@example.com", Role::User);
        let store_id = seed_store(&state, "Corner Shop", "shop@example.com", &owner);
        {
            let connection = state.db_connection().lock().unwrap();
            submit_rating(alice.id, store_id, 4, &connection).unwrap();
        }

        let server = get_test_server(state);
        let response = server
            .get(endpoints::ADMIN_STORES)
            .authorization_bearer(&admin_token)
            .await;

        response.assert_status_ok();
        let stores = response.json::<Vec<Store>>();
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].overall_rating, Some(4.0));
        assert_eq!(stores[0].total_ratings, 1);
    }

    #[tokio::test]
    async fn reconcile_repairs_drifted_rating_fields() {
        let state = get_test_state();
        let (_, admin_token) = seed_user(&state, "Ada", "ada@example.com", Role::Admin);
        let (owner, _) = seed_user(&state, "Olive", "olive@example.com", Role::Owner);
        let (alice, _) = seed_user(&state, "Alice", "alice@example.com", Role::User);
        let store_id = seed_store(&state, "Corner Shop", "shop@example.com", &owner);
        {
            let connection = state.db_connection().lock().unwrap();
            submit_rating(alice.id, store_id, 4, &connection).unwrap();
            connection
                .execute(
                    "UPDATE store SET overall_rating = 1.0, total_ratings = 42 WHERE id = ?1",
                    [store_id.as_i64()],
                )
                .unwrap();
        }

        let server = get_test_server(state.clone());
        let response = server
            .post(&format_endpoint(
                endpoints::ADMIN_STORE_RECONCILE,
                store_id.as_i64(),
            ))
            .authorization_bearer(&admin_token)
            .await;

        response.assert_status_ok();

        let store = get_store_by_id(store_id, &state.db_connection().lock().unwrap()).unwrap();
        assert_eq!(store.overall_rating, Some(4.0));
        assert_eq!(store.total_ratings, 1);
    }

    #[tokio::test]
    async fn reconcile_is_admin_only() {
        let state = get_test_state();
        let (owner, owner_token) = seed_user(&state, "Olive", "olive@example.com", Role::Owner);
        let store_id = seed_store(&state, "Corner Shop", "shop@example.com", &owner);
        let server = get_test_server(state);

        server
            .post(&format_endpoint(
                endpoints::ADMIN_STORE_RECONCILE,
                store_id.as_i64(),
            ))
            .authorization_bearer(&owner_token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
