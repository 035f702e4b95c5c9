use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::{common::role::Role, mongodb::Id};

/// Core user data, as stored in the database.
///
/// Email and student ID (when present) are globally unique, enforced by
/// indexes on the collection.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    pub hashed_password: String,
    pub role: Role,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Create a new user with the given role, hashing the password.
    pub fn new(name: String, email: String, password: &str, role: Role) -> Self {
        Self {
            name,
            email,
            student_id: None,
            level: None,
            course: None,
            hashed_password: hash_password(password),
            role,
            created_at: Utc::now(),
        }
    }

    /// Check whether the given password is correct.
    ///
    /// Any mismatch (wrong password, malformed hash) is reported the same
    /// way, so callers cannot distinguish the failure modes.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.hashed_password, password.as_ref()).unwrap_or(false)
    }
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> String {
    // 16 bytes is the recommended salt length for argon2.
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
        .expect("The default argon2 config is valid")
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl UserCore {
        pub fn example_voter() -> Self {
            let mut voter = Self::new(
                "Alice Voter".to_string(),
                "alice@example.com".to_string(),
                "correct horse battery staple",
                Role::Voter,
            );
            voter.student_id = Some("ND/22/0042".to_string());
            voter.level = Some("ND2".to_string());
            voter
        }
    }

    impl User {
        pub fn example_voter() -> Self {
            Self {
                id: Id::new(),
                user: UserCore::example_voter(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let user = UserCore::example_voter();
        assert!(user.verify_password("correct horse battery staple"));
        assert!(!user.verify_password("incorrect horse battery staple"));
    }

    #[test]
    fn malformed_hash_is_just_a_mismatch() {
        let mut user = UserCore::example_voter();
        user.hashed_password = "not a valid encoded hash".to_string();
        assert!(!user.verify_password("correct horse battery staple"));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("password"), hash_password("password"));
    }
}
