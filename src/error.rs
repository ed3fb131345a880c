// Data access error kinds and their HTTP mapping
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use sqlx::error::ErrorKind as DriverErrorKind;
use std::collections::HashMap;
use thiserror::Error;

use crate::database::manager::DatabaseError;
use crate::validate::ValidationErrors;

/// Categorised failure returned by every repository operation
#[derive(Debug, Error)]
pub enum AdalError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(ValidationErrors),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error executing `{statement}`: {source}")]
    Internal {
        statement: String,
        #[source]
        source: DatabaseError,
    },

    #[error("operation cancelled")]
    Cancelled,
}

/// Tag of an `AdalError`, handy for assertions and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    BadRequest,
    Conflict,
    Internal,
    Cancelled,
}

impl AdalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdalError::NotFound(_) => ErrorKind::NotFound,
            AdalError::Forbidden(_) => ErrorKind::Forbidden,
            AdalError::BadRequest(_) => ErrorKind::BadRequest,
            AdalError::Conflict(_) => ErrorKind::Conflict,
            AdalError::Internal { .. } => ErrorKind::Internal,
            AdalError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AdalError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AdalError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AdalError::Conflict(message.into())
    }

    /// Single field/rule failure
    pub fn bad_request(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut errors = ValidationErrors::default();
        errors.push(field, rule, message);
        AdalError::BadRequest(errors)
    }

    pub fn internal(statement: impl Into<String>, source: impl Into<DatabaseError>) -> Self {
        AdalError::Internal {
            statement: statement.into(),
            source: source.into(),
        }
    }

    /// Internal failure that did not come from the driver
    pub fn invariant(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::internal(statement, DatabaseError::Invariant(message.into()))
    }

    /// Report field errors as members of `prefix`; other kinds pass through
    pub fn prefixed(self, prefix: &str) -> Self {
        match self {
            AdalError::BadRequest(errors) => AdalError::BadRequest(errors.prefixed(prefix)),
            other => other,
        }
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            AdalError::BadRequest(errors) => Some(errors),
            _ => None,
        }
    }

    /// Classify a driver error raised by `statement`.
    ///
    /// `unique_fields` maps constraint/index names to the request field they guard; a unique
    /// violation on a known constraint becomes the same bad-request the validator would have
    /// produced, an unknown one becomes a conflict. Everything else is internal.
    pub fn from_driver(err: sqlx::Error, statement: &str, unique_fields: &[(&str, &str)]) -> Self {
        let classified = err
            .as_database_error()
            .map(|db| (db.kind(), db.constraint().map(str::to_owned)));

        match classified {
            Some((DriverErrorKind::UniqueViolation, constraint)) => {
                let field = constraint.as_deref().and_then(|name| {
                    unique_fields
                        .iter()
                        .find(|(constraint, _)| *constraint == name)
                        .map(|(_, field)| *field)
                });
                match field {
                    Some(field) => {
                        AdalError::bad_request(field, "unique", format!("{} must be unique", field))
                    }
                    None => AdalError::conflict(format!(
                        "unique constraint {} violated",
                        constraint.as_deref().unwrap_or("(unnamed)")
                    )),
                }
            }
            _ => {
                tracing::error!("Database error executing `{}`: {}", statement, err);
                AdalError::internal(statement, err)
            }
        }
    }
}

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<AdalError> for ApiError {
    fn from(err: AdalError) -> Self {
        match err {
            AdalError::NotFound(msg) => ApiError::NotFound(msg),
            AdalError::Forbidden(msg) => ApiError::Forbidden(msg),
            AdalError::Conflict(msg) => ApiError::Conflict(msg),
            AdalError::BadRequest(errors) => {
                let mut field_errors: HashMap<String, String> = HashMap::new();
                for e in errors.iter() {
                    field_errors
                        .entry(e.field.clone())
                        .and_modify(|existing| {
                            existing.push_str("; ");
                            existing.push_str(&e.message);
                        })
                        .or_insert_with(|| e.message.clone());
                }
                ApiError::validation_error(errors.to_string(), Some(field_errors))
            }
            AdalError::Internal { statement, source } => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Internal error in `{}`: {}", statement, source);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            AdalError::Cancelled => ApiError::service_unavailable("Request was cancelled"),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        tracing::error!("Database error: {}", err);
        ApiError::service_unavailable("Database temporarily unavailable")
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
