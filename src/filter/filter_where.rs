use super::error::FilterError;
use crate::database::query_builder::{RawPredicate, SqlValue};

/// Keywords allowed between columns and placeholders
const KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "IS", "NULL", "IN", "LIKE", "ILIKE", "BETWEEN", "TRUE", "FALSE",
];

const OPERATORS: &[&str] = &["<=", ">=", "<>", "!=", "=", "<", ">"];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Column(&'static str),
    Keyword(&'static str),
    Operator(&'static str),
    Placeholder,
    Open,
    Close,
    Comma,
}

impl Token {
    fn as_sql(&self) -> &'static str {
        match self {
            Token::Column(c) => *c,
            Token::Keyword(k) => *k,
            Token::Operator(o) => *o,
            Token::Placeholder => "?",
            Token::Open => "(",
            Token::Close => ")",
            Token::Comma => ",",
        }
    }
}

pub struct FilterWhere;

impl FilterWhere {
    /// Check caller-written predicate text and pair it with its arguments.
    ///
    /// The text may only contain the entity's columns, `?` placeholders, comparison operators,
    /// boolean keywords, parentheses and commas; literals of any kind are refused so that values
    /// always travel as bound arguments. The result is re-rendered from the token stream.
    pub fn validate(
        text: &str,
        args: Vec<SqlValue>,
        columns: &'static [&'static str],
    ) -> Result<RawPredicate, FilterError> {
        let tokens = Self::tokenize(text, columns)?;
        if tokens.is_empty() {
            return Err(FilterError::InvalidWhereClause("empty predicate".to_string()));
        }
        Self::check_parens(&tokens)?;

        let placeholders = tokens.iter().filter(|t| **t == Token::Placeholder).count();
        if placeholders != args.len() {
            return Err(FilterError::ArgumentMismatch {
                placeholders,
                args: args.len(),
            });
        }

        let sql = tokens.iter().map(Token::as_sql).collect::<Vec<_>>().join(" ");
        Ok(RawPredicate::checked(sql, args))
    }

    fn tokenize(text: &str, columns: &'static [&'static str]) -> Result<Vec<Token>, FilterError> {
        let mut tokens = Vec::new();
        let mut rest = text;

        while let Some(c) = rest.chars().next() {
            if c.is_whitespace() {
                rest = &rest[c.len_utf8()..];
                continue;
            }
            match c {
                '?' => tokens.push(Token::Placeholder),
                '(' => tokens.push(Token::Open),
                ')' => tokens.push(Token::Close),
                ',' => tokens.push(Token::Comma),
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let end = rest
                        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                        .unwrap_or(rest.len());
                    let word = &rest[..end];
                    tokens.push(Self::word(word, columns)?);
                    rest = &rest[end..];
                    continue;
                }
                _ => {
                    let op = OPERATORS
                        .iter()
                        .find(|op| rest.starts_with(**op))
                        .ok_or_else(|| {
                            FilterError::InvalidWhereClause(format!("unexpected character {:?}", c))
                        })?;
                    tokens.push(Token::Operator(if *op == "!=" { "<>" } else { *op }));
                    rest = &rest[op.len()..];
                    continue;
                }
            }
            rest = &rest[c.len_utf8()..];
        }
        Ok(tokens)
    }

    fn word(word: &str, columns: &'static [&'static str]) -> Result<Token, FilterError> {
        if let Some(column) = columns.iter().find(|c| **c == word) {
            return Ok(Token::Column(*column));
        }
        if let Some(keyword) = KEYWORDS.iter().find(|k| k.eq_ignore_ascii_case(word)) {
            return Ok(Token::Keyword(*keyword));
        }
        Err(FilterError::InvalidColumn(word.to_string()))
    }

    fn check_parens(tokens: &[Token]) -> Result<(), FilterError> {
        let mut depth: usize = 0;
        for token in tokens {
            match token {
                Token::Open => depth += 1,
                Token::Close => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| FilterError::InvalidWhereClause("unbalanced parentheses".to_string()))?;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(FilterError::InvalidWhereClause("unbalanced parentheses".to_string()));
        }
        Ok(())
    }
}
