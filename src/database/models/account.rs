use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::{ModelError, Table};
use validator::{Validate, ValidationError};

use crate::validate::{one_of, valid_uuid, ValidationContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Pending,
    Disabled,
}

impl AccountStatus {
    pub const VALUES: &'static [&'static str] = &["active", "pending", "disabled"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Pending => "pending",
            AccountStatus::Disabled => "disabled",
        }
    }

    /// `pending -> active -> disabled`, `disabled -> active`; nothing returns to pending
    pub fn can_transition_to(&self, next: AccountStatus) -> bool {
        use AccountStatus::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Pending, Active) | (Pending, Disabled) => true,
            (Active, Disabled) | (Disabled, Active) => true,
            _ => false,
        }
    }
}

impl FromStr for AccountStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "pending" => Ok(AccountStatus::Pending),
            "disabled" => Ok(AccountStatus::Disabled),
            other => Err(ModelError::unknown("account status", other)),
        }
    }
}

impl TryFrom<String> for AccountStatus {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub zipcode: String,
    #[sqlx(try_from = "String")]
    pub status: AccountStatus,
    pub timezone: String,
    pub signup_user_id: Option<String>,
    pub billing_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Table for Account {
    const NAME: &'static str = "accounts";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "address1",
        "address2",
        "city",
        "region",
        "country",
        "zipcode",
        "status",
        "timezone",
        "signup_user_id",
        "billing_user_id",
        "created_at",
        "updated_at",
        "archived_at",
    ];
    const UNIQUE_FIELDS: &'static [(&'static str, &'static str)] = &[("accounts_name_key", "name")];
}

impl Account {
    pub const DEFAULT_TIMEZONE: &'static str = "America/Anchorage";
}

fn account_status(value: &str) -> Result<(), ValidationError> {
    one_of(value, AccountStatus::VALUES)
}

fn unique_name(_: &str, ctx: &ValidationContext) -> Result<(), ValidationError> {
    ctx.require_unique("name")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(context = ValidationContext)]
pub struct AccountCreateRequest {
    #[validate(length(min = 1, max = 255), custom(function = "unique_name", use_context))]
    pub name: String,
    #[validate(length(min = 1, code = "required"))]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[validate(length(min = 1, code = "required"))]
    pub city: String,
    #[validate(length(min = 1, code = "required"))]
    pub region: String,
    #[validate(length(min = 1, code = "required"))]
    pub country: String,
    #[validate(length(min = 1, code = "required"))]
    pub zipcode: String,
    #[serde(default)]
    #[validate(custom(function = "account_status"))]
    pub status: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "valid_uuid"))]
    pub signup_user_id: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "valid_uuid"))]
    pub billing_user_id: Option<String>,
}

/// Partial update; `None` leaves the column untouched. Columns required on create stay
/// required when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(context = ValidationContext)]
pub struct AccountUpdateRequest {
    #[validate(length(min = 1, code = "required"), custom(function = "valid_uuid"))]
    pub id: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 255), custom(function = "unique_name", use_context))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, code = "required"))]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, code = "required"))]
    pub city: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, code = "required"))]
    pub region: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, code = "required"))]
    pub country: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, code = "required"))]
    pub zipcode: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "account_status"))]
    pub status: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "valid_uuid"))]
    pub signup_user_id: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "valid_uuid"))]
    pub billing_user_id: Option<String>,
}

impl AccountUpdateRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_with;

    #[test]
    fn status_transitions() {
        use AccountStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Active.can_transition_to(Disabled));
        assert!(Disabled.can_transition_to(Active));
        assert!(Active.can_transition_to(Active));
        assert!(!Active.can_transition_to(Pending));
        assert!(!Disabled.can_transition_to(Pending));
    }

    #[test]
    fn status_parses_closed_set() {
        assert_eq!("disabled".parse::<AccountStatus>(), Ok(AccountStatus::Disabled));
        assert!("archived".parse::<AccountStatus>().is_err());
    }

    #[test]
    fn create_request_requires_address_and_unique_name() {
        let req = AccountCreateRequest {
            name: "Acme".into(),
            ..Default::default()
        };
        let ctx = ValidationContext::new().with_unique("name", false);
        let err = validate_with(&ctx, &req).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("name", "unique"));
        assert!(errors.has("address1", "required"));
        assert!(errors.has("zipcode", "required"));
        assert!(!errors.has("address2", "required"));
    }

    #[test]
    fn update_request_skips_absent_name() {
        let req = AccountUpdateRequest::new("6f1a0e8c-3b7a-4b4e-9d2c-1f0e5a6b7c8d");
        assert!(validate_with(&ValidationContext::new(), &req).is_ok());

        let req = AccountUpdateRequest {
            status: Some("archived".into()),
            ..AccountUpdateRequest::new("nope")
        };
        let err = validate_with(&ValidationContext::new(), &req).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("id", "uuid"));
        assert!(errors.has("status", "oneof"));
    }

    #[test]
    fn update_request_rejects_blanking_required_columns() {
        let ctx = ValidationContext::new().with_unique("name", true);
        let req = AccountUpdateRequest {
            name: Some(String::new()),
            zipcode: Some(String::new()),
            address2: Some(String::new()),
            ..AccountUpdateRequest::new("6f1a0e8c-3b7a-4b4e-9d2c-1f0e5a6b7c8d")
        };
        let err = validate_with(&ctx, &req).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("name", "required"));
        assert!(errors.has("zipcode", "required"));
        assert_eq!(errors.len(), 2);
    }
}
