use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// The flat set of user roles. There is no inheritance between them; the
/// only special case is the superadmin override in [`Role::is_any_of`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Voter,
    Admin,
    Superadmin,
    Auditor,
}

impl Role {
    /// Is this role a member of the allowed set?
    /// A superadmin passes every check regardless of the set.
    pub fn is_any_of(self, allowed: &[Role]) -> bool {
        self == Role::Superadmin || allowed.contains(&self)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Voter => "voter",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
            Self::Auditor => "auditor",
        };
        write!(f, "{name}")
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_roles_pass() {
        assert!(Role::Admin.is_any_of(&[Role::Admin]));
        assert!(Role::Auditor.is_any_of(&[Role::Admin, Role::Auditor]));
        assert!(Role::Voter.is_any_of(&[Role::Voter]));
    }

    #[test]
    fn non_member_roles_fail() {
        assert!(!Role::Voter.is_any_of(&[Role::Admin]));
        assert!(!Role::Auditor.is_any_of(&[Role::Admin]));
        assert!(!Role::Admin.is_any_of(&[Role::Auditor]));
    }

    #[test]
    fn superadmin_always_passes() {
        assert!(Role::Superadmin.is_any_of(&[Role::Admin]));
        assert!(Role::Superadmin.is_any_of(&[Role::Auditor]));
        assert!(Role::Superadmin.is_any_of(&[Role::Voter]));
        assert!(Role::Superadmin.is_any_of(&[]));
    }

    #[test]
    fn roles_serialise_lowercase() {
        assert_eq!(
            rocket::serde::json::serde_json::to_string(&Role::Superadmin).unwrap(),
            "\"superadmin\""
        );
    }
}
