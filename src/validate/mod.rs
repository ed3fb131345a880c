//! Request validation on top of the `validator` derive.
//!
//! Request structs declare their rules with `#[derive(Validate)]`. Rules that depend on facts the
//! repository looked up beforehand (uniqueness, the preference being set) read them from a
//! [`ValidationContext`] handed to `validate_with_args`. Failures are flattened into
//! [`ValidationErrors`] with one rule reported per field.

pub mod error;
pub mod layout;

pub use error::{FieldError, ValidationErrors};

use std::borrow::Cow;
use std::collections::HashMap;

use validator::{ValidateArgs, ValidationError};

use crate::database::models::account_preference::PreferenceName;
use crate::error::AdalError;

/// Side facts consulted by context-dependent rules
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    unique: HashMap<&'static str, bool>,
    preference: Option<PreferenceName>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unique(mut self, field: &'static str, unique: bool) -> Self {
        self.unique.insert(field, unique);
        self
    }

    pub fn with_preference(mut self, name: Option<PreferenceName>) -> Self {
        self.preference = name;
        self
    }

    pub fn unique_fact(&self, field: &str) -> Option<bool> {
        self.unique.get(field).copied()
    }

    pub fn preference(&self) -> Option<PreferenceName> {
        self.preference
    }

    /// A missing fact fails closed
    pub fn require_unique(&self, field: &str) -> Result<(), ValidationError> {
        match self.unique_fact(field) {
            Some(true) => Ok(()),
            _ => Err(failure("unique", "must be unique")),
        }
    }
}

/// Validate a request whose rules read facts from `ctx`
pub fn validate_with<'a, V>(ctx: &'a ValidationContext, request: &V) -> Result<(), AdalError>
where
    V: ValidateArgs<'a, Args = &'a ValidationContext>,
{
    request.validate_with_args(ctx).map_err(bad_request)
}

/// Validate a request whose rules stand on their own
pub fn validate<V: validator::Validate>(request: &V) -> Result<(), AdalError> {
    request.validate().map_err(bad_request)
}

pub fn bad_request(errors: validator::ValidationErrors) -> AdalError {
    AdalError::BadRequest(ValidationErrors::from(&errors))
}

pub(crate) fn failure(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Canonical hyphenated UUID; emptiness is left to `required`
pub fn valid_uuid(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || is_uuid(value) {
        Ok(())
    } else {
        Err(failure("uuid", "must be a valid UUID"))
    }
}

/// Member of a closed set; emptiness is left to `required`
pub fn one_of(value: &str, allowed: &[&str]) -> Result<(), ValidationError> {
    if value.is_empty() || allowed.contains(&value) {
        Ok(())
    } else {
        Err(failure("oneof", format!("must be one of [{}]", allowed.join(" "))))
    }
}

/// Every element a member of a closed set
pub fn all_of(values: &[String], allowed: &[&str]) -> Result<(), ValidationError> {
    values.iter().try_for_each(|v| match allowed.contains(&v.as_str()) {
        true => Ok(()),
        false => Err(failure("oneof", format!("must be one of [{}]", allowed.join(" ")))),
    })
}

/// Layout valid for the preference named in the context
pub fn preference_value(value: &str, ctx: &ValidationContext) -> Result<(), ValidationError> {
    match ctx.preference() {
        Some(name) if layout::preference_value_ok(name, value) => Ok(()),
        _ => Err(failure("preference_value", "is not a valid format for this preference")),
    }
}

/// `required,uuid` on a bare identifier argument
pub fn require_uuid(field: &'static str, value: &str) -> Result<(), AdalError> {
    if value.is_empty() {
        return Err(AdalError::bad_request(field, "required", format!("{} is required", field)));
    }
    if !is_uuid(value) {
        return Err(AdalError::bad_request(field, "uuid", format!("{} must be a valid UUID", field)));
    }
    Ok(())
}

pub fn is_uuid(value: &str) -> bool {
    value.len() == 36 && uuid::Uuid::try_parse(value).is_ok()
}
