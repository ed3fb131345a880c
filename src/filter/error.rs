use thiserror::Error;

use crate::error::AdalError;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Invalid ORDER BY entry: {0}")]
    InvalidOrder(String),

    #[error("Invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("WHERE clause has {placeholders} placeholders but {args} arguments")]
    ArgumentMismatch { placeholders: usize, args: usize },

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),
}

impl FilterError {
    /// Request field the error is reported against
    pub fn field(&self) -> &'static str {
        match self {
            FilterError::InvalidOrder(_) => "order",
            FilterError::InvalidColumn(_) | FilterError::InvalidWhereClause(_) => "where",
            FilterError::ArgumentMismatch { .. } => "args",
            FilterError::InvalidOffset(_) => "offset",
        }
    }

    pub fn rule(&self) -> &'static str {
        match self {
            FilterError::InvalidColumn(_) => "column",
            FilterError::InvalidOrder(_) => "order",
            FilterError::InvalidWhereClause(_) => "where",
            FilterError::ArgumentMismatch { .. } => "len",
            FilterError::InvalidOffset(_) => "min",
        }
    }
}

impl From<FilterError> for AdalError {
    fn from(err: FilterError) -> Self {
        AdalError::bad_request(err.field(), err.rule(), err.to_string())
    }
}
