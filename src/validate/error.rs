use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

use validator::{ValidationError, ValidationErrorsKind};

/// Rule names in reporting order; a field reports the first of its failures listed here
const PRECEDENCE: &[&str] = &[
    "required",
    "uuid",
    "oneof",
    "email",
    "min",
    "max",
    "eqfield",
    "preference_value",
    "unique",
];

/// One failed field/rule pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub rule: String,
    pub message: String,
}

/// Every failure found in a request, sorted by field path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(
        &mut self,
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldError {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// The same failures with every field path under `prefix`
    pub fn prefixed(mut self, prefix: &str) -> Self {
        for e in &mut self.errors {
            e.field = format!("{}.{}", prefix, e.field);
        }
        self
    }

    /// Whether `field` failed `rule`
    pub fn has(&self, field: &str, rule: &str) -> bool {
        self.errors.iter().any(|e| e.field == field && e.rule == rule)
    }
}

impl From<&validator::ValidationErrors> for ValidationErrors {
    fn from(errors: &validator::ValidationErrors) -> Self {
        let mut out = ValidationErrors::default();
        flatten(None, errors, &mut out);
        out.errors.sort_by(|a, b| a.field.cmp(&b.field));
        out
    }
}

fn flatten(prefix: Option<&str>, errors: &validator::ValidationErrors, out: &mut ValidationErrors) {
    for (field, kind) in errors.errors() {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, field),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(failures) => {
                let first = failures
                    .iter()
                    .map(|failure| (rule_of(failure), failure))
                    .min_by_key(|(rule, _)| PRECEDENCE.iter().position(|r| *r == rule.as_str()).unwrap_or(PRECEDENCE.len()));
                if let Some((rule, failure)) = first {
                    let message = describe(field, &rule, failure);
                    out.push(path, rule, message);
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(Some(&path), inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten(Some(&format!("{}[{}]", path, index)), inner, out);
                }
            }
        }
    }
}

/// Rule name for a failure; combined `length` bounds resolve against the offending value
fn rule_of(failure: &ValidationError) -> String {
    if failure.code != "length" {
        return failure.code.to_string();
    }
    let param = |name: &str| failure.params.get(name).and_then(Value::as_u64);
    let len = failure.params.get("value").and_then(|value| match value {
        Value::String(s) => Some(s.chars().count() as u64),
        Value::Array(items) => Some(items.len() as u64),
        _ => None,
    });
    match (len, param("min"), param("max")) {
        (Some(0), Some(_), _) => "required".into(),
        (Some(len), Some(min), _) if len < min => "min".into(),
        (Some(len), _, Some(max)) if len > max => "max".into(),
        _ => "length".into(),
    }
}

fn describe(field: &str, rule: &str, failure: &ValidationError) -> String {
    if let Some(message) = &failure.message {
        return format!("{} {}", field, message);
    }
    let bound = |name: &str| failure.params.get(name).map(Value::to_string).unwrap_or_default();
    let text: Cow<'static, str> = match rule {
        "required" => "is required".into(),
        "email" => "must be a valid email address".into(),
        "eqfield" => "must match its counterpart".into(),
        "min" => format!("must be at least {} characters", bound("min")).into(),
        "max" => format!("must be at most {} characters", bound("max")).into(),
        other => format!("failed {}", other).into(),
    };
    format!("{} {}", field, text)
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {} ({})", e.field, e.rule, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
