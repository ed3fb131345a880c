pub mod account;
pub mod account_preference;
pub mod user;
pub mod user_account;

use thiserror::Error;

pub use account::{Account, AccountCreateRequest, AccountStatus, AccountUpdateRequest};
pub use account_preference::{AccountPreference, AccountPreferenceSetRequest, PreferenceName};
pub use user::{User, UserCreateRequest, UserUpdatePasswordRequest, UserUpdateRequest};
pub use user_account::{
    Roles, UserAccount, UserAccountCreateRequest, UserAccountStatus, UserAccountUpdateRequest,
};

/// Static description of the table behind a record type
pub trait Table {
    const NAME: &'static str;

    /// Columns selectable and orderable by callers
    const COLUMNS: &'static [&'static str];

    /// Unique constraint or index name -> request field it guards
    const UNIQUE_FIELDS: &'static [(&'static str, &'static str)] = &[];
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown {kind} value: {value}")]
    UnknownValue { kind: &'static str, value: String },
}

impl ModelError {
    pub(crate) fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        ModelError::UnknownValue {
            kind,
            value: value.into(),
        }
    }
}
