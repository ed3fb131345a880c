use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use super::Table;
use validator::{Validate, ValidationError};

use crate::validate::{valid_uuid, ValidationContext};

/// A credential-bearing principal. The password hash is never selected into this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Table for User {
    const NAME: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "first_name",
        "last_name",
        "email",
        "timezone",
        "created_at",
        "updated_at",
        "archived_at",
    ];
    const UNIQUE_FIELDS: &'static [(&'static str, &'static str)] = &[("users_email_key", "email")];
}

impl User {
    pub const DEFAULT_TIMEZONE: &'static str = "America/Anchorage";

    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

fn unique_email(_: &str, ctx: &ValidationContext) -> Result<(), ValidationError> {
    ctx.require_unique("email")
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(context = ValidationContext)]
pub struct UserCreateRequest {
    #[validate(length(min = 1, max = 200))]
    pub first_name: String,
    #[validate(length(min = 1, max = 200))]
    pub last_name: String,
    #[validate(
        length(min = 1, code = "required"),
        email,
        custom(function = "unique_email", use_context)
    )]
    pub email: String,
    #[validate(length(min = 8, max = 72))]
    pub password: String,
    #[validate(
        length(min = 1, code = "required"),
        must_match(other = "password", code = "eqfield")
    )]
    pub password_confirm: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl fmt::Debug for UserCreateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCreateRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("timezone", &self.timezone)
            .finish()
    }
}

/// Partial update; `None` leaves the column untouched. Names and email stay required when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(context = ValidationContext)]
pub struct UserUpdateRequest {
    #[validate(length(min = 1, code = "required"), custom(function = "valid_uuid"))]
    pub id: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub first_name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub last_name: Option<String>,
    #[serde(default)]
    #[validate(
        length(min = 1, code = "required"),
        email,
        custom(function = "unique_email", use_context)
    )]
    pub email: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl UserUpdateRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct UserUpdatePasswordRequest {
    #[validate(length(min = 1, code = "required"), custom(function = "valid_uuid"))]
    pub id: String,
    #[validate(length(min = 8, max = 72))]
    pub password: String,
    #[validate(
        length(min = 1, code = "required"),
        must_match(other = "password", code = "eqfield")
    )]
    pub password_confirm: String,
}

impl fmt::Debug for UserUpdatePasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserUpdatePasswordRequest")
            .field("id", &self.id)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{validate, validate_with};

    fn create_request() -> UserCreateRequest {
        UserCreateRequest {
            first_name: "Gabi".into(),
            last_name: "May".into(),
            email: "a@x".into(),
            password: "p@ss-W0rd".into(),
            password_confirm: "p@ss-W0rd".into(),
            timezone: None,
        }
    }

    #[test]
    fn debug_redacts_password() {
        let out = format!("{:?}", create_request());
        assert!(!out.contains("p@ss-W0rd"));
        assert!(out.contains("<redacted>"));
    }

    #[test]
    fn create_request_rules() {
        let ctx = ValidationContext::new().with_unique("email", true);
        assert!(validate_with(&ctx, &create_request()).is_ok());

        let req = UserCreateRequest {
            email: "nobody".into(),
            password_confirm: "different".into(),
            ..create_request()
        };
        let err = validate_with(&ctx, &req).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("email", "email"));
        assert!(errors.has("password_confirm", "eqfield"));
    }

    #[test]
    fn short_password_fails_min() {
        let req = UserUpdatePasswordRequest {
            id: "6f1a0e8c-3b7a-4b4e-9d2c-1f0e5a6b7c8d".into(),
            password: "short".into(),
            password_confirm: "short".into(),
        };
        let err = validate(&req).unwrap_err();
        assert!(err.validation_errors().unwrap().has("password", "min"));
    }

    #[test]
    fn empty_password_is_required_not_short() {
        let req = UserCreateRequest {
            password: String::new(),
            password_confirm: String::new(),
            ..create_request()
        };
        let ctx = ValidationContext::new().with_unique("email", true);
        let err = validate_with(&ctx, &req).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("password", "required"));
        assert!(errors.has("password_confirm", "required"));
    }

    #[test]
    fn update_request_rejects_blank_name_and_email() {
        let ctx = ValidationContext::new().with_unique("email", true);
        let req = UserUpdateRequest {
            first_name: Some(String::new()),
            email: Some(String::new()),
            timezone: Some(String::new()),
            ..UserUpdateRequest::new("6f1a0e8c-3b7a-4b4e-9d2c-1f0e5a6b7c8d")
        };
        let err = validate_with(&ctx, &req).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("first_name", "required"));
        assert!(errors.has("email", "required"));
        assert_eq!(errors.len(), 2);

        let req = UserUpdateRequest {
            email: Some("nobody".into()),
            ..UserUpdateRequest::new("6f1a0e8c-3b7a-4b4e-9d2c-1f0e5a6b7c8d")
        };
        let err = validate_with(&ctx, &req).unwrap_err();
        assert!(err.validation_errors().unwrap().has("email", "email"));
    }

    #[test]
    fn full_name_joins_parts() {
        let user = User {
            id: String::new(),
            first_name: "Gabi".into(),
            last_name: "May".into(),
            email: "a@x".into(),
            timezone: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            archived_at: None,
        };
        assert_eq!(user.name(), "Gabi May");
    }
}
