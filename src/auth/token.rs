//! Issuing and verifying the JSON Web Tokens that carry a user's identity.
//!
//! A token embeds the user's ID and role at sign-in time. The role inside a
//! live token is trusted as-is on each request and never re-checked against
//! the database, so a role change only takes effect once the user signs in
//! again. Roles are immutable in this application, which makes that tradeoff
//! invisible in practice.

use axum::{
    RequestPartsExt,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{AppState, Error, Role, user::{User, UserID}};

/// How long an auth token stays valid after sign-in.
pub const TOKEN_DURATION: Duration = Duration::hours(24);

/// The contents of an auth token: the authenticated identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub sub: UserID,
    /// The user's role at the time the token was issued.
    pub role: Role,
    /// The expiry time of the token as a unix timestamp.
    pub exp: usize,
    /// The time the token was issued as a unix timestamp.
    pub iat: usize,
}

impl Claims {
    /// The ID of the authenticated user.
    pub fn user_id(&self) -> UserID {
        self.sub
    }
}

/// Issue a token for `user` containing their ID and role.
///
/// # Errors
///
/// Returns [Error::TokenCreation] if the token could not be signed.
pub fn encode_token(user: &User, encoding_key: &EncodingKey) -> Result<String, Error> {
    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        sub: user.id,
        role: user.role,
        exp: (now + TOKEN_DURATION).unix_timestamp() as usize,
        iat: now.unix_timestamp() as usize,
    };

    encode(&Header::default(), &claims, encoding_key).map_err(|error| {
        tracing::error!("could not sign auth token: {}", error);
        Error::TokenCreation
    })
}

/// Verify `token` and extract the identity it carries.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the token is malformed, has a bad
/// signature or has expired.
pub fn decode_token(token: &str, decoding_key: &DecodingKey) -> Result<Claims, Error> {
    decode::<Claims>(token, decoding_key, &Validation::default())
        .map(|token_data| token_data.claims)
        .map_err(|_| Error::Unauthenticated)
}

impl<S> FromRequestParts<S> for Claims
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::Unauthenticated)?;

        let state = AppState::from_ref(state);

        decode_token(bearer.token(), state.decoding_key())
    }
}

#[cfg(test)]
mod token_tests {
    use std::str::FromStr;

    use email_address::EmailAddress;
    use jsonwebtoken::{DecodingKey, EncodingKey, Header, encode};
    use time::OffsetDateTime;

    use crate::{
        Error, PasswordHash, Role,
        user::{User, UserID},
    };

    use super::{Claims, decode_token, encode_token};

    fn test_user() -> User {
        User {
            id: UserID::new(1),
            name: "Rita".to_string(),
            email: EmailAddress::from_str("rita@example.com").unwrap(),
            password_hash: PasswordHash::new_unchecked("hunter2"),
            address: "12 Example Street".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn decode_returns_the_encoded_identity() {
        let encoding_key = EncodingKey::from_secret(b"42");
        let decoding_key = DecodingKey::from_secret(b"42");
        let user = test_user();

        let token = encode_token(&user, &encoding_key).unwrap();
        let claims = decode_token(&token, &decoding_key).unwrap();

        assert_eq!(claims.user_id(), user.id);
        assert_eq!(claims.role, user.role);
    }

    #[test]
    fn decode_rejects_a_token_signed_with_another_key() {
        let user = test_user();

        let token = encode_token(&user, &EncodingKey::from_secret(b"42")).unwrap();

        assert_eq!(
            decode_token(&token, &DecodingKey::from_secret(b"not 42")),
            Err(Error::Unauthenticated)
        );
    }

    #[test]
    fn decode_rejects_an_expired_token() {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: UserID::new(1),
            role: Role::User,
            exp: (now - 3600) as usize,
            iat: (now - 7200) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"42"),
        )
        .unwrap();

        assert_eq!(
            decode_token(&token, &DecodingKey::from_secret(b"42")),
            Err(Error::Unauthenticated)
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(
            decode_token("not.a.token", &DecodingKey::from_secret(b"42")),
            Err(Error::Unauthenticated)
        );
    }
}
