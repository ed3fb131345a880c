use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{FromRow, Postgres};

use crate::database::manager::DatabaseError;

/// A bindable argument. Every variant is nullable so NULL keeps its column type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Int(Option<i64>),
    Bool(Option<bool>),
    Timestamp(Option<DateTime<Utc>>),
    TextArray(Option<Vec<String>>),
}

impl SqlValue {
    pub fn null_text() -> Self {
        SqlValue::Text(None)
    }

    pub fn null_timestamp() -> Self {
        SqlValue::Timestamp(None)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(Some(v.to_string()))
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(Some(v))
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(Some(v.clone()))
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(Some(v))
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(Some(v as i64))
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(Some(v))
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(Some(v))
    }
}

impl From<Option<DateTime<Utc>>> for SqlValue {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Vec<String>> for SqlValue {
    fn from(v: Vec<String>) -> Self {
        SqlValue::TextArray(Some(v))
    }
}

/// Placeholder convention of the target database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `?` (MySQL, SQLite)
    Question,
    /// `$1, $2, …` (PostgreSQL)
    #[default]
    Dollar,
    /// `@p1, @p2, …` (SQL Server)
    AtP,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: &'static str,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(column: &'static str) -> Self {
        Self { column, direction: SortDirection::Asc }
    }

    pub fn desc(column: &'static str) -> Self {
        Self { column, direction: SortDirection::Desc }
    }
}

/// Caller-written predicate text that has already been checked against the entity's columns.
/// Only the filter module can construct one.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPredicate {
    sql: String,
    args: Vec<SqlValue>,
}

impl RawPredicate {
    pub(crate) fn checked(sql: String, args: Vec<SqlValue>) -> Self {
        Self { sql, args }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Predicate algebra. Leaves name columns from closed per-entity sets; values are always bound.
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(&'static str, SqlValue),
    NotEq(&'static str, SqlValue),
    IsNull(&'static str),
    IsNotNull(&'static str),
    In(&'static str, Box<Select>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Raw(RawPredicate),
}

impl Predicate {
    pub fn eq(column: &'static str, value: impl Into<SqlValue>) -> Self {
        Predicate::Eq(column, value.into())
    }

    pub fn not_eq(column: &'static str, value: impl Into<SqlValue>) -> Self {
        Predicate::NotEq(column, value.into())
    }

    pub fn is_null(column: &'static str) -> Self {
        Predicate::IsNull(column)
    }

    pub fn is_not_null(column: &'static str) -> Self {
        Predicate::IsNotNull(column)
    }

    pub fn in_select(column: &'static str, select: Select) -> Self {
        Predicate::In(column, Box::new(select))
    }

    fn render(&self, sql: &mut String, args: &mut Vec<SqlValue>) {
        match self {
            Predicate::Eq(column, value) => {
                sql.push_str(column);
                sql.push_str(" = ?");
                args.push(value.clone());
            }
            Predicate::NotEq(column, value) => {
                sql.push_str(column);
                sql.push_str(" <> ?");
                args.push(value.clone());
            }
            Predicate::IsNull(column) => {
                sql.push_str(column);
                sql.push_str(" IS NULL");
            }
            Predicate::IsNotNull(column) => {
                sql.push_str(column);
                sql.push_str(" IS NOT NULL");
            }
            Predicate::In(column, select) => {
                sql.push_str(column);
                sql.push_str(" IN (");
                select.render_into(sql, args);
                sql.push(')');
            }
            Predicate::And(parts) => render_joined(parts, " AND ", "TRUE", sql, args),
            Predicate::Or(parts) => render_joined(parts, " OR ", "FALSE", sql, args),
            Predicate::Raw(raw) => {
                sql.push('(');
                sql.push_str(&raw.sql);
                sql.push(')');
                args.extend(raw.args.iter().cloned());
            }
        }
    }
}

fn render_joined(
    parts: &[Predicate],
    joiner: &str,
    empty: &str,
    sql: &mut String,
    args: &mut Vec<SqlValue>,
) {
    match parts {
        [] => sql.push_str(empty),
        [only] => only.render(sql, args),
        _ => {
            sql.push('(');
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    sql.push_str(joiner);
                }
                part.render(sql, args);
            }
            sql.push(')');
        }
    }
}

fn render_where(filter: &[Predicate], sql: &mut String, args: &mut Vec<SqlValue>) {
    for (i, predicate) in filter.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        predicate.render(sql, args);
    }
}

/// Rendered statement with `?` placeholders (or rebound ones after [`Statement::rebind`])
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

impl Statement {
    /// Number of `?` placeholders outside quoted literals
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        scan_placeholders(&self.sql, |_| count += 1);
        count
    }

    /// Rewrite `?` placeholders for `dialect`, checking they match the argument vector
    pub fn rebind(self, dialect: Dialect) -> Result<Statement, DatabaseError> {
        let placeholders = self.placeholder_count();
        if placeholders != self.args.len() {
            return Err(DatabaseError::Invariant(format!(
                "statement has {} placeholders but {} arguments: {}",
                placeholders,
                self.args.len(),
                self.sql
            )));
        }
        Ok(Statement {
            sql: rebind(dialect, &self.sql),
            args: self.args,
        })
    }
}

/// Walks `sql`, calling `on_placeholder` with the byte offset of each `?` outside quotes
fn scan_placeholders(sql: &str, mut on_placeholder: impl FnMut(usize)) {
    let mut quote: Option<char> = None;
    for (i, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '?' => on_placeholder(i),
                _ => {}
            },
        }
    }
}

/// Rewrite `?` placeholders into the dialect's positional form
pub fn rebind(dialect: Dialect, sql: &str) -> String {
    let prefix = match dialect {
        Dialect::Question => return sql.to_string(),
        Dialect::Dollar => "$",
        Dialect::AtP => "@p",
    };
    let mut positions = Vec::new();
    scan_placeholders(sql, |i| positions.push(i));

    let mut out = String::with_capacity(sql.len() + positions.len() * 3);
    let mut last = 0;
    for (n, pos) in positions.iter().enumerate() {
        out.push_str(&sql[last..*pos]);
        out.push_str(prefix);
        out.push_str(&(n + 1).to_string());
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    out
}

#[derive(Debug, Clone)]
pub struct Select {
    table: &'static str,
    columns: &'static [&'static str],
    filter: Vec<Predicate>,
    order: Vec<OrderBy>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Select {
    pub fn from(table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            table,
            columns,
            filter: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// AND another predicate into the WHERE clause
    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    pub fn order_by(mut self, order: Vec<OrderBy>) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<i64>) -> Self {
        self.offset = offset;
        self
    }

    pub fn build(&self) -> Statement {
        let mut sql = String::new();
        let mut args = Vec::new();
        self.render_into(&mut sql, &mut args);
        Statement { sql, args }
    }

    fn render_into(&self, sql: &mut String, args: &mut Vec<SqlValue>) {
        sql.push_str("SELECT ");
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(self.table);
        render_where(&self.filter, sql, args);

        if !self.order.is_empty() {
            let parts: Vec<String> = self
                .order
                .iter()
                .map(|o| format!("{} {}", o.column, o.direction.to_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            args.push(SqlValue::from(limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(" OFFSET ?");
            args.push(SqlValue::from(offset));
        }
    }
}

/// SET item of an upsert's conflict branch
#[derive(Debug, Clone)]
pub enum Assignment {
    Excluded(&'static str),
    Value(&'static str, SqlValue),
}

#[derive(Debug, Clone)]
pub struct Insert {
    table: &'static str,
    values: Vec<(&'static str, SqlValue)>,
    conflict: Option<(&'static str, Vec<Assignment>)>,
}

impl Insert {
    pub fn into_table(table: &'static str) -> Self {
        Self {
            table,
            values: Vec::new(),
            conflict: None,
        }
    }

    pub fn value(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.values.push((column, value.into()));
        self
    }

    /// `ON CONFLICT ON CONSTRAINT <constraint> DO UPDATE SET …`
    pub fn on_conflict_update(mut self, constraint: &'static str, set: Vec<Assignment>) -> Self {
        self.conflict = Some((constraint, set));
        self
    }

    pub fn build(&self) -> Statement {
        let columns: Vec<&str> = self.values.iter().map(|(c, _)| *c).collect();
        let placeholders = vec!["?"; self.values.len()].join(", ");
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders
        );
        let mut args: Vec<SqlValue> = self.values.iter().map(|(_, v)| v.clone()).collect();

        if let Some((constraint, set)) = &self.conflict {
            sql.push_str(" ON CONFLICT ON CONSTRAINT ");
            sql.push_str(constraint);
            sql.push_str(" DO UPDATE SET ");
            let parts: Vec<String> = set
                .iter()
                .map(|a| match a {
                    Assignment::Excluded(column) => format!("{0} = EXCLUDED.{0}", column),
                    Assignment::Value(column, value) => {
                        args.push(value.clone());
                        format!("{} = ?", column)
                    }
                })
                .collect();
            sql.push_str(&parts.join(", "));
        }
        Statement { sql, args }
    }
}

#[derive(Debug, Clone)]
pub struct Update {
    table: &'static str,
    set: Vec<(&'static str, SqlValue)>,
    filter: Vec<Predicate>,
}

impl Update {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            set: Vec::new(),
            filter: Vec::new(),
        }
    }

    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.set.push((column, value.into()));
        self
    }

    pub fn set_mut(&mut self, column: &'static str, value: impl Into<SqlValue>) {
        self.set.push((column, value.into()));
    }

    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    /// True when no column is assigned
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn assigned_columns(&self) -> Vec<&'static str> {
        self.set.iter().map(|(c, _)| *c).collect()
    }

    pub fn build(&self) -> Statement {
        let mut args: Vec<SqlValue> = self.set.iter().map(|(_, v)| v.clone()).collect();
        let assignments: Vec<String> = self.set.iter().map(|(c, _)| format!("{} = ?", c)).collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        render_where(&self.filter, &mut sql, &mut args);
        Statement { sql, args }
    }
}

#[derive(Debug, Clone)]
pub struct Delete {
    table: &'static str,
    filter: Vec<Predicate>,
}

impl Delete {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            filter: Vec::new(),
        }
    }

    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    pub fn build(&self) -> Statement {
        let mut sql = format!("DELETE FROM {}", self.table);
        let mut args = Vec::new();
        render_where(&self.filter, &mut sql, &mut args);
        Statement { sql, args }
    }
}

pub(crate) fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: SqlValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        SqlValue::Text(s) => q.bind(s),
        SqlValue::Int(i) => q.bind(i),
        SqlValue::Bool(b) => q.bind(b),
        SqlValue::Timestamp(t) => q.bind(t),
        SqlValue::TextArray(a) => q.bind(a),
    }
}

pub(crate) fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    v: SqlValue,
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match v {
        SqlValue::Text(s) => q.bind(s),
        SqlValue::Int(i) => q.bind(i),
        SqlValue::Bool(b) => q.bind(b),
        SqlValue::Timestamp(t) => q.bind(t),
        SqlValue::TextArray(a) => q.bind(a),
    }
}
