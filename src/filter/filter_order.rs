use super::error::FilterError;
use crate::database::query_builder::{OrderBy, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse entries of the form `<column>( asc| desc)?`, resolving each column against the
    /// entity's closed column set
    pub fn validate_and_parse(
        entries: &[String],
        columns: &'static [&'static str],
    ) -> Result<Vec<OrderBy>, FilterError> {
        entries
            .iter()
            .map(|entry| Self::parse_entry(entry, columns))
            .collect()
    }

    fn parse_entry(entry: &str, columns: &'static [&'static str]) -> Result<OrderBy, FilterError> {
        let mut parts = entry.split_whitespace();
        let (column, direction) = match (parts.next(), parts.next(), parts.next()) {
            (Some(column), direction, None) => (column, direction),
            _ => return Err(FilterError::InvalidOrder(entry.to_string())),
        };

        let column = columns
            .iter()
            .copied()
            .find(|known| *known == column)
            .ok_or_else(|| FilterError::InvalidOrder(entry.to_string()))?;

        let direction = match direction {
            None => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(_) => return Err(FilterError::InvalidOrder(entry.to_string())),
        };

        Ok(OrderBy { column, direction })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[&str] = &["id", "name", "created_at"];

    fn parse(entries: &[&str]) -> Result<Vec<OrderBy>, FilterError> {
        let owned: Vec<String> = entries.iter().map(|s| s.to_string()).collect();
        FilterOrder::validate_and_parse(&owned, COLUMNS)
    }

    #[test]
    fn accepts_known_columns_with_optional_direction() {
        let order = parse(&["created_at desc", "name", "id ASC"]).unwrap();
        assert_eq!(
            order,
            vec![OrderBy::desc("created_at"), OrderBy::asc("name"), OrderBy::asc("id")]
        );
    }

    #[test]
    fn rejects_unknown_columns_and_directions() {
        assert!(matches!(parse(&["password_hash"]), Err(FilterError::InvalidOrder(_))));
        assert!(matches!(parse(&["name sideways"]), Err(FilterError::InvalidOrder(_))));
        assert!(matches!(parse(&["name desc, id"]), Err(FilterError::InvalidOrder(_))));
        assert!(matches!(parse(&["name; DROP TABLE accounts"]), Err(FilterError::InvalidOrder(_))));
        assert!(matches!(parse(&[""]), Err(FilterError::InvalidOrder(_))));
    }
}
