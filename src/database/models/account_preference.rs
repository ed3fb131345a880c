use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::{ModelError, Table};
use validator::{Validate, ValidationError};

use crate::validate::{one_of, preference_value, valid_uuid, ValidationContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceName {
    DatetimeFormat,
    DateFormat,
    TimeFormat,
}

impl PreferenceName {
    pub const VALUES: &'static [&'static str] = &["datetime_format", "date_format", "time_format"];
    pub const ALL: [PreferenceName; 3] = [
        PreferenceName::DatetimeFormat,
        PreferenceName::DateFormat,
        PreferenceName::TimeFormat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceName::DatetimeFormat => "datetime_format",
            PreferenceName::DateFormat => "date_format",
            PreferenceName::TimeFormat => "time_format",
        }
    }

    /// Layout used when an account has no row for this preference
    pub fn default_value(&self) -> &'static str {
        match self {
            PreferenceName::DatetimeFormat => "2006-01-02 at 3:04PM MST",
            PreferenceName::DateFormat => "2006-01-02",
            PreferenceName::TimeFormat => "3:04PM MST",
        }
    }
}

impl FromStr for PreferenceName {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "datetime_format" => Ok(PreferenceName::DatetimeFormat),
            "date_format" => Ok(PreferenceName::DateFormat),
            "time_format" => Ok(PreferenceName::TimeFormat),
            other => Err(ModelError::unknown("preference name", other)),
        }
    }
}

impl TryFrom<String> for PreferenceName {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for PreferenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account-scoped format string, keyed by (account_id, name)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AccountPreference {
    pub account_id: String,
    #[sqlx(try_from = "String")]
    pub name: PreferenceName,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Table for AccountPreference {
    const NAME: &'static str = "account_preferences";
    const COLUMNS: &'static [&'static str] = &[
        "account_id",
        "name",
        "value",
        "created_at",
        "updated_at",
        "archived_at",
    ];
    const UNIQUE_FIELDS: &'static [(&'static str, &'static str)] = &[("account_preferences_pkey", "name")];
}

fn known_preference(value: &str) -> Result<(), ValidationError> {
    one_of(value, PreferenceName::VALUES)
}

/// Upsert of one preference; `name` stays textual so an unknown name is a field error
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(context = ValidationContext)]
pub struct AccountPreferenceSetRequest {
    #[validate(length(min = 1, code = "required"), custom(function = "valid_uuid"))]
    pub account_id: String,
    #[validate(length(min = 1, code = "required"), custom(function = "known_preference"))]
    pub name: String,
    #[validate(length(min = 1, max = 200), custom(function = "preference_value", use_context))]
    pub value: String,
}

impl AccountPreferenceSetRequest {
    pub fn new(account_id: impl Into<String>, name: PreferenceName, value: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            name: name.as_str().to_string(),
            value: value.into(),
        }
    }

    pub fn preference_name(&self) -> Option<PreferenceName> {
        self.name.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_with;

    const ACCOUNT: &str = "0b9cf1a2-4d5e-4f60-8a7b-9c0d1e2f3a4b";

    fn ctx_for(req: &AccountPreferenceSetRequest) -> ValidationContext {
        ValidationContext::new().with_preference(req.preference_name())
    }

    #[test]
    fn defaults_are_valid_values() {
        for name in PreferenceName::ALL {
            let req = AccountPreferenceSetRequest::new(ACCOUNT, name, name.default_value());
            assert!(validate_with(&ctx_for(&req), &req).is_ok(), "{}", name);
        }
    }

    #[test]
    fn garbage_value_cites_preference_value() {
        let req = AccountPreferenceSetRequest::new(ACCOUNT, PreferenceName::DatetimeFormat, "xxxxxx");
        let err = validate_with(&ctx_for(&req), &req).unwrap_err();
        assert!(err.validation_errors().unwrap().has("value", "preference_value"));
    }

    #[test]
    fn unknown_name_is_oneof() {
        let req = AccountPreferenceSetRequest {
            account_id: ACCOUNT.into(),
            name: "color".into(),
            value: "2006-01-02".into(),
        };
        let err = validate_with(&ctx_for(&req), &req).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("name", "oneof"));
        assert!(errors.has("value", "preference_value"));
    }
}
