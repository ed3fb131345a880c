//! Response records for the HTTP layer. Storage records stay plain; rendering of times and
//! enum labels happens here, with the account's format preferences.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::database::models::{Account, AccountPreference, PreferenceName, User, UserAccount};
use crate::repositories::account_preference::effective_value;
use crate::validate::layout::{self, ZonedTime};

/// Layouts used to render times for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormats {
    pub datetime: String,
    pub date: String,
    pub time: String,
}

impl Default for TimeFormats {
    fn default() -> Self {
        Self::from_preferences(&[])
    }
}

impl TimeFormats {
    pub fn from_preferences(preferences: &[AccountPreference]) -> Self {
        Self {
            datetime: effective_value(preferences, PreferenceName::DatetimeFormat).to_string(),
            date: effective_value(preferences, PreferenceName::DateFormat).to_string(),
            time: effective_value(preferences, PreferenceName::TimeFormat).to_string(),
        }
    }

    pub fn datetime(&self, at: DateTime<Utc>) -> String {
        layout::format(&self.datetime, &ZonedTime::from_utc(at))
    }

    pub fn date(&self, at: DateTime<Utc>) -> String {
        layout::format(&self.date, &ZonedTime::from_utc(at))
    }

    pub fn time(&self, at: DateTime<Utc>) -> String {
        layout::format(&self.time, &ZonedTime::from_utc(at))
    }
}

/// `"active"` -> `"Active"`, `"datetime_format"` -> `"Datetime format"`
pub fn label(value: &str) -> String {
    let spaced = value.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub zipcode: String,
    pub status: String,
    pub status_label: String,
    pub timezone: String,
    pub signup_user_id: Option<String>,
    pub billing_user_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub archived_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub timezone: String,
    pub created_at: String,
    pub updated_at: String,
    pub archived_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserAccountResponse {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub roles: Vec<String>,
    pub role_labels: Vec<String>,
    pub status: String,
    pub status_label: String,
    pub created_at: String,
    pub updated_at: String,
    pub archived_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountPreferenceResponse {
    pub account_id: String,
    pub name: String,
    pub name_label: String,
    pub value: String,
    pub example: String,
    pub updated_at: String,
}

pub fn account_response(account: &Account, formats: &TimeFormats) -> AccountResponse {
    AccountResponse {
        id: account.id.clone(),
        name: account.name.clone(),
        address1: account.address1.clone(),
        address2: account.address2.clone(),
        city: account.city.clone(),
        region: account.region.clone(),
        country: account.country.clone(),
        zipcode: account.zipcode.clone(),
        status: account.status.as_str().to_string(),
        status_label: label(account.status.as_str()),
        timezone: account.timezone.clone(),
        signup_user_id: account.signup_user_id.clone(),
        billing_user_id: account.billing_user_id.clone(),
        created_at: formats.datetime(account.created_at),
        updated_at: formats.datetime(account.updated_at),
        archived_at: account.archived_at.map(|at| formats.datetime(at)),
    }
}

pub fn user_response(user: &User, formats: &TimeFormats) -> UserResponse {
    UserResponse {
        id: user.id.clone(),
        name: user.name(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
        timezone: user.timezone.clone(),
        created_at: formats.datetime(user.created_at),
        updated_at: formats.datetime(user.updated_at),
        archived_at: user.archived_at.map(|at| formats.datetime(at)),
    }
}

pub fn user_account_response(membership: &UserAccount, formats: &TimeFormats) -> UserAccountResponse {
    UserAccountResponse {
        id: membership.id.clone(),
        user_id: membership.user_id.clone(),
        account_id: membership.account_id.clone(),
        roles: membership.roles.to_strings(),
        role_labels: membership.roles.0.iter().map(|r| label(r.as_str())).collect(),
        status: membership.status.as_str().to_string(),
        status_label: label(membership.status.as_str()),
        created_at: formats.datetime(membership.created_at),
        updated_at: formats.datetime(membership.updated_at),
        archived_at: membership.archived_at.map(|at| formats.datetime(at)),
    }
}

/// The preference plus the current time rendered with it
pub fn preference_response(preference: &AccountPreference, now: DateTime<Utc>) -> AccountPreferenceResponse {
    let example = layout::format(&preference.value, &ZonedTime::from_utc(now));
    AccountPreferenceResponse {
        account_id: preference.account_id.clone(),
        name: preference.name.as_str().to_string(),
        name_label: label(preference.name.as_str()),
        value: preference.value.clone(),
        example,
        updated_at: TimeFormats::default().datetime(preference.updated_at),
    }
}

/// `{ "success": true, "data": ... }`
pub fn envelope<T: Serialize>(data: &T) -> Value {
    json!({
        "success": true,
        "data": data,
    })
}
