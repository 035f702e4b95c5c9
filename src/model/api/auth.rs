use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome, Request},
    State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    api::user::UserResponse,
    common::role::Role,
    db::user::User,
    mongodb::{Coll, Id},
};

/// An access policy for a group of routes: which roles may pass the
/// [`AuthToken`] request guard.
pub trait Access {
    /// Human-readable description of who is allowed, for error messages.
    const DESCRIPTION: &'static str;

    /// Does the given role satisfy this policy?
    fn permits(role: Role) -> bool;
}

/// Any authenticated user, regardless of role.
#[derive(Debug)]
pub struct AnyUser;

impl Access for AnyUser {
    const DESCRIPTION: &'static str = "any authenticated user";

    fn permits(_role: Role) -> bool {
        true
    }
}

/// Admins (superadmins pass implicitly).
pub struct AdminAccess;

impl Access for AdminAccess {
    const DESCRIPTION: &'static str = "admin or superadmin";

    fn permits(role: Role) -> bool {
        role.is_any_of(&[Role::Admin])
    }
}

/// Superadmins only.
pub struct SuperadminAccess;

impl Access for SuperadminAccess {
    const DESCRIPTION: &'static str = "superadmin";

    fn permits(role: Role) -> bool {
        role.is_any_of(&[])
    }
}

/// Auditors (superadmins pass implicitly).
pub struct AuditorAccess;

impl Access for AuditorAccess {
    const DESCRIPTION: &'static str = "auditor or superadmin";

    fn permits(role: Role) -> bool {
        role.is_any_of(&[Role::Auditor])
    }
}

/// A verified bearer token identifying a specific user, parameterised by
/// the access policy the route requires.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<A> {
    /// The user's email, the canonical token subject.
    #[serde(rename = "sub")]
    pub email: String,
    pub role: Role,
    pub user_id: Id,
    #[serde(skip)]
    phantom: PhantomData<A>,
}

impl<A> AuthToken<A> {
    /// Create a new token for the given user.
    pub fn new(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            role: user.role,
            user_id: user.id,
            phantom: PhantomData,
        }
    }

    /// Serialize this token into a signed JWT.
    pub fn into_jwt(self, config: &Config) -> String {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings")
    }

    /// Deserialize and verify a token from a JWT string.
    pub fn from_jwt(jwt: &str, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            jwt,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<A>>| claims.claims.token)?;
        Ok(token)
    }
}

/// JWT claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<A> {
    #[serde(flatten, bound = "")]
    token: AuthToken<A>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, A> FromRequest<'r> for AuthToken<A>
where
    A: Access + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the `Authorization` header and verify that
    /// its role satisfies the route's access policy.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        // Extract the bearer token.
        let jwt = match req
            .headers()
            .get_one("Authorization")
            .and_then(|header| header.strip_prefix("Bearer "))
        {
            Some(jwt) => jwt,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Missing bearer token"),
                ));
            }
        };

        // Decode and verify it.
        let token = match Self::from_jwt(jwt, config) {
            Ok(token) => token,
            Err(err) => return Outcome::Failure((Status::Unauthorized, err)),
        };

        // Check it satisfies the access policy.
        if !A::permits(token.role) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::forbidden(format!("This operation requires: {}", A::DESCRIPTION)),
            ));
        }

        // Check the user still exists (tokens outlive account deletion).
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();
        match Coll::<User>::from_db(db)
            .find_one(token.user_id.as_doc(), None)
            .await
        {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => Outcome::Failure((
                Status::Unauthorized,
                Error::unauthorized("User no longer exists"),
            )),
            Err(err) => Outcome::Failure((Status::InternalServerError, err.into())),
        }
    }
}

/// Raw login credentials, received as form data. The username may be an
/// email or a student ID.
#[derive(Debug, FromForm)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A successful login response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserResponse,
}

impl TokenResponse {
    pub fn bearer(access_token: String, user: UserResponse) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn token_round_trip() {
        let config = Config::example();
        let user = User::example_voter();

        let jwt = AuthToken::<AnyUser>::new(&user).into_jwt(&config);
        let token = AuthToken::<AnyUser>::from_jwt(&jwt, &config).unwrap();

        assert_eq!(token.email, user.email);
        assert_eq!(token.role, Role::Voter);
        assert_eq!(token.user_id, user.id);
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = Config::example();
        let user = User::example_voter();

        let claims = Claims {
            token: AuthToken::<AnyUser>::new(&user),
            expire_at: Utc::now() - Duration::hours(2),
        };
        let jwt = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .unwrap();

        let err = AuthToken::<AnyUser>::from_jwt(&jwt, &config).unwrap_err();
        assert!(matches!(
            err,
            Error::Jwt(ref e) if matches!(
                e.kind(),
                jsonwebtoken::errors::ErrorKind::ExpiredSignature
            )
        ));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = Config::example();
        let user = User::example_voter();

        let mut jwt = AuthToken::<AnyUser>::new(&user).into_jwt(&config);
        // Flip a character in the signature.
        let flipped = if jwt.ends_with('A') { 'B' } else { 'A' };
        jwt.pop();
        jwt.push(flipped);

        assert!(AuthToken::<AnyUser>::from_jwt(&jwt, &config).is_err());
    }

    #[test]
    fn access_policies() {
        assert!(AnyUser::permits(Role::Voter));
        assert!(AnyUser::permits(Role::Auditor));

        assert!(AdminAccess::permits(Role::Admin));
        assert!(AdminAccess::permits(Role::Superadmin));
        assert!(!AdminAccess::permits(Role::Voter));
        assert!(!AdminAccess::permits(Role::Auditor));

        assert!(SuperadminAccess::permits(Role::Superadmin));
        assert!(!SuperadminAccess::permits(Role::Admin));

        assert!(AuditorAccess::permits(Role::Auditor));
        assert!(AuditorAccess::permits(Role::Superadmin));
        assert!(!AuditorAccess::permits(Role::Voter));
    }
}
