use tracing::warn;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use crate::database::models::Table;
use crate::database::query_builder::{OrderBy, Predicate, Select, SqlValue};
use crate::database::repository::StoreSettings;

/// Caller-facing search options for a `find`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindFilter {
    /// Predicate text over the entity's columns with `?` placeholders
    pub where_clause: Option<String>,
    pub args: Vec<SqlValue>,
    /// Entries of the form `<column>( asc| desc)?`
    pub order: Vec<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub include_archived: bool,
}

impl FindFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_clause(mut self, text: impl Into<String>, args: Vec<SqlValue>) -> Self {
        self.where_clause = Some(text.into());
        self.args = args;
        self
    }

    pub fn order<S: Into<String>>(mut self, entries: impl IntoIterator<Item = S>) -> Self {
        self.order = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn include_archived(mut self, include: bool) -> Self {
        self.include_archived = include;
        self
    }

    /// Validate against `T` and apply to its base SELECT. Claim scoping is added by the caller.
    pub fn apply<T: Table>(&self, select: Select, settings: &StoreSettings) -> Result<Select, FilterError> {
        let mut select = select;
        if !self.include_archived {
            select = select.and_where(Predicate::is_null("archived_at"));
        }
        if let Some(text) = self.where_clause.as_deref().filter(|t| !t.trim().is_empty()) {
            let raw = FilterWhere::validate(text, self.args.clone(), T::COLUMNS)?;
            select = select.and_where(Predicate::Raw(raw));
        } else if !self.args.is_empty() {
            return Err(FilterError::ArgumentMismatch {
                placeholders: 0,
                args: self.args.len(),
            });
        }

        let order: Vec<OrderBy> = FilterOrder::validate_and_parse(&self.order, T::COLUMNS)?;
        let limit = self.clamped_limit(settings);
        let offset = match self.offset {
            Some(offset) if offset < 0 => {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()))
            }
            other => other,
        };

        Ok(select.order_by(order).limit(limit).offset(offset))
    }

    /// Clamp to `1..=max_limit`; no limit falls back to the configured default
    fn clamped_limit(&self, settings: &StoreSettings) -> Option<i64> {
        let max_limit = settings.max_limit;
        match self.limit.or(settings.default_limit) {
            None => None,
            Some(limit) if limit > max_limit => {
                if settings.filter_debug_logging {
                    warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
                }
                Some(max_limit)
            }
            Some(limit) if limit < 1 => {
                if settings.filter_debug_logging {
                    warn!("Limit {} below 1, raising to 1", limit);
                }
                Some(1)
            }
            Some(limit) => Some(limit),
        }
    }
}
