use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::role::Role,
    db::user::{NewUser, User, UserCore},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A registration request. Whatever role the caller supplies is ignored:
/// self-registration always produces a voter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    /// Accepted for API compatibility, never honoured.
    #[serde(default)]
    pub role: Option<Role>,
}

impl RegisterRequest {
    /// Validate the request and convert it into a voter record, hashing the
    /// password.
    pub fn into_new_user(self) -> Result<NewUser> {
        if self.name.trim().len() < 2 {
            return Err(Error::bad_request("Name is too short"));
        }
        if self.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        // HND programmes are course-specific, so the course is mandatory.
        let is_hnd = self
            .level
            .as_deref()
            .map(|level| level.to_uppercase().starts_with("HND"))
            .unwrap_or(false);
        if is_hnd && self.course.is_none() {
            return Err(Error::bad_request("Course is required for HND students"));
        }

        let mut user = UserCore::new(self.name, self.email, &self.password, Role::Voter);
        user.student_id = self.student_id;
        user.level = self.level;
        user.course = self.course;
        Ok(user)
    }
}

/// A request to create a staff account (admin or auditor). The role is
/// chosen by the endpoint, not the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl StaffRequest {
    /// Validate the request and convert it into a user record with the
    /// given role, hashing the password.
    pub fn into_new_user(self, role: Role) -> Result<NewUser> {
        if self.name.trim().len() < 2 {
            return Err(Error::bad_request("Name is too short"));
        }
        if self.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        Ok(UserCore::new(self.name, self.email, &self.password, role))
    }
}

/// The public view of a user. Never exposes the password hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: ApiId,
    pub name: String,
    pub email: String,
    pub student_id: Option<String>,
    pub level: Option<String>,
    pub course: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            name: user.user.name,
            email: user.user.email,
            student_id: user.user.student_id,
            level: user.user.level,
            course: user.user.course,
            role: user.user.role,
            created_at: user.user.created_at,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl StaffRequest {
        pub fn example() -> Self {
            Self {
                name: "Returning Officer".to_string(),
                email: "officer@example.com".to_string(),
                password: "plenty-strong".to_string(),
            }
        }
    }

    impl RegisterRequest {
        pub fn example() -> Self {
            Self {
                name: "Al Mustapha".to_string(),
                email: "al@example.com".to_string(),
                password: "plenty-strong".to_string(),
                student_id: Some("ND/21/0007".to_string()),
                level: Some("ND1".to_string()),
                course: None,
                role: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hnd_level_requires_a_course() {
        let request = RegisterRequest {
            level: Some("HND2".to_string()),
            course: None,
            ..RegisterRequest::example()
        };
        assert!(matches!(
            request.into_new_user(),
            Err(Error::BadRequest(_))
        ));

        // Case-insensitive on the level prefix.
        let request = RegisterRequest {
            level: Some("hnd1".to_string()),
            course: None,
            ..RegisterRequest::example()
        };
        assert!(request.into_new_user().is_err());
    }

    #[test]
    fn hnd_level_with_course_is_accepted() {
        let request = RegisterRequest {
            level: Some("HND2".to_string()),
            course: Some("Computer Science".to_string()),
            ..RegisterRequest::example()
        };
        let user = request.into_new_user().unwrap();
        assert_eq!(user.course.as_deref(), Some("Computer Science"));
    }

    #[test]
    fn non_hnd_level_does_not_require_a_course() {
        let user = RegisterRequest::example().into_new_user().unwrap();
        assert_eq!(user.level.as_deref(), Some("ND1"));
        assert_eq!(user.course, None);
    }

    #[test]
    fn role_is_always_forced_to_voter() {
        let request = RegisterRequest {
            role: Some(Role::Superadmin),
            ..RegisterRequest::example()
        };
        let user = request.into_new_user().unwrap();
        assert_eq!(user.role, Role::Voter);
    }

    #[test]
    fn short_passwords_are_rejected() {
        let request = RegisterRequest {
            password: "short".to_string(),
            ..RegisterRequest::example()
        };
        assert!(request.into_new_user().is_err());
    }

    #[test]
    fn staff_request_keeps_the_given_role() {
        let admin = StaffRequest::example()
            .into_new_user(Role::Admin)
            .unwrap();
        assert_eq!(admin.role, Role::Admin);

        let auditor = StaffRequest::example()
            .into_new_user(Role::Auditor)
            .unwrap();
        assert_eq!(auditor.role, Role::Auditor);
    }

    #[test]
    fn staff_request_validates_like_registration() {
        let request = StaffRequest {
            password: "short".to_string(),
            ..StaffRequest::example()
        };
        assert!(request.into_new_user(Role::Admin).is_err());
    }

    #[test]
    fn password_is_stored_hashed() {
        let request = RegisterRequest::example();
        let password = request.password.clone();
        let user = request.into_new_user().unwrap();
        assert_ne!(user.hashed_password, password);
        assert!(user.verify_password(&password));
    }
}
