//! Caller identity as seen by the data layer. Token validation happens upstream; repositories
//! receive an already-trusted [`Claims`] value.

pub mod gate;
pub mod password;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::database::models::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub const VALUES: &'static [&'static str] = &["admin", "user"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(ModelError::unknown("role", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audience is the account a session is bound to, subject the user behind it.
/// Both empty means an internal caller that bypasses every gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Claims {
    pub fn new(audience: impl Into<String>, subject: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            audience: audience.into(),
            subject: subject.into(),
            roles,
        }
    }

    pub fn internal() -> Self {
        Self::default()
    }

    pub fn is_internal(&self) -> bool {
        self.audience.is_empty() && self.subject.is_empty()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_claims_are_internal() {
        assert!(Claims::internal().is_internal());
        // roles alone do not make a caller tenant-scoped
        assert!(Claims::new("", "", vec![Role::Admin]).is_internal());
        assert!(!Claims::new("acc1", "", vec![]).is_internal());
        assert!(!Claims::new("", "u1", vec![]).is_internal());
    }

    #[test]
    fn roles_round_trip_through_json() {
        let claims = Claims::new("acc1", "u1", vec![Role::Admin]);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["roles"][0], "admin");
        let back: Claims = serde_json::from_value(json).unwrap();
        assert!(back.is_admin());
        assert!(!back.has_role(Role::User));
    }
}
