use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::{ModelError, Table};
use crate::auth::Role;
use validator::{Validate, ValidationError};

use crate::validate::{all_of, one_of, valid_uuid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAccountStatus {
    Active,
    Invited,
    Disabled,
}

impl UserAccountStatus {
    pub const VALUES: &'static [&'static str] = &["active", "invited", "disabled"];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserAccountStatus::Active => "active",
            UserAccountStatus::Invited => "invited",
            UserAccountStatus::Disabled => "disabled",
        }
    }
}

impl FromStr for UserAccountStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserAccountStatus::Active),
            "invited" => Ok(UserAccountStatus::Invited),
            "disabled" => Ok(UserAccountStatus::Disabled),
            other => Err(ModelError::unknown("membership status", other)),
        }
    }
}

impl TryFrom<String> for UserAccountStatus {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for UserAccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role set stored as `text[]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(pub Vec<Role>);

impl Roles {
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.contains(Role::Admin)
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|r| r.as_str().to_string()).collect()
    }
}

impl TryFrom<Vec<String>> for Roles {
    type Error = ModelError;

    fn try_from(values: Vec<String>) -> Result<Self, Self::Error> {
        values
            .iter()
            .map(|v| v.parse::<Role>().map_err(|_| ModelError::unknown("role", v.as_str())))
            .collect::<Result<Vec<_>, _>>()
            .map(Roles)
    }
}

/// Membership linking a user to an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserAccount {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    #[sqlx(try_from = "Vec<String>")]
    pub roles: Roles,
    #[sqlx(try_from = "String")]
    pub status: UserAccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Table for UserAccount {
    const NAME: &'static str = "users_accounts";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "account_id",
        "roles",
        "status",
        "created_at",
        "updated_at",
        "archived_at",
    ];
    const UNIQUE_FIELDS: &'static [(&'static str, &'static str)] =
        &[("users_accounts_user_account_key", "account_id")];
}

fn known_roles(values: &[String]) -> Result<(), ValidationError> {
    all_of(values, Role::VALUES)
}

fn membership_status(value: &str) -> Result<(), ValidationError> {
    one_of(value, UserAccountStatus::VALUES)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct UserAccountCreateRequest {
    #[validate(length(min = 1, code = "required"), custom(function = "valid_uuid"))]
    pub user_id: String,
    #[validate(length(min = 1, code = "required"), custom(function = "valid_uuid"))]
    pub account_id: String,
    #[validate(length(min = 1, code = "required"), custom(function = "known_roles"))]
    pub roles: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "membership_status"))]
    pub status: Option<String>,
}

/// Partial update keyed by membership id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct UserAccountUpdateRequest {
    #[validate(length(min = 1, code = "required"), custom(function = "valid_uuid"))]
    pub id: String,
    #[serde(default)]
    #[validate(custom(function = "known_roles"))]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    #[validate(custom(function = "membership_status"))]
    pub status: Option<String>,
}
