use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::context::Context;
use crate::database::models::Table;
use crate::database::query_builder::{bind_param_query, bind_param_query_as, Dialect, Statement};
use crate::error::{AdalError, ErrorKind};

/// Knobs repositories read from configuration, resolved once at construction
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub max_limit: i64,
    pub default_limit: Option<i64>,
    pub filter_debug_logging: bool,
    pub enable_query_logging: bool,
    pub enable_slow_query_warning: bool,
    pub slow_query_threshold: Duration,
    pub bcrypt_cost: u32,
    pub dialect: Dialect,
}

impl StoreSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_limit: config.filter.effective_max_limit(),
            default_limit: config.filter.default_limit,
            filter_debug_logging: config.filter.debug_logging,
            enable_query_logging: config.database.enable_query_logging,
            enable_slow_query_warning: config.database.enable_slow_query_warning,
            slow_query_threshold: Duration::from_millis(config.database.slow_query_threshold_ms),
            bcrypt_cost: config.security.bcrypt_cost,
            dialect: Dialect::Dollar,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::development())
    }
}

/// The shared pool plus settings, handed to every repository by reference
#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
    settings: Arc<StoreSettings>,
}

impl Store {
    pub fn new(pool: PgPool, settings: StoreSettings) -> Self {
        Self {
            pool,
            settings: Arc::new(settings),
        }
    }

    pub fn from_config(pool: PgPool, config: &AppConfig) -> Self {
        Self::new(pool, StoreSettings::from_config(config))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub async fn acquire(&self, ctx: &Context) -> Result<PoolConnection<Postgres>, AdalError> {
        ctx.run(async {
            self.pool
                .acquire()
                .await
                .map_err(|e| AdalError::internal("acquire connection", e))
        })
        .await
    }

    pub async fn begin(&self, ctx: &Context) -> Result<Transaction<'static, Postgres>, AdalError> {
        ctx.run(async {
            self.pool
                .begin()
                .await
                .map_err(|e| AdalError::internal("BEGIN", e))
        })
        .await
    }

    /// Runner for statements against `T`'s table
    pub fn runner<'a, T: Table>(&'a self, ctx: &'a Context) -> Runner<'a> {
        Runner {
            ctx,
            settings: &self.settings,
            unique_fields: T::UNIQUE_FIELDS,
        }
    }
}

/// Commit on success, roll back on failure. A cancelled rollback is still attempted so the
/// connection returns to the pool clean.
pub async fn finish<T>(
    ctx: &Context,
    tx: Transaction<'static, Postgres>,
    result: Result<T, AdalError>,
) -> Result<T, AdalError> {
    match result {
        Ok(value) => {
            ctx.run(async { tx.commit().await.map_err(|e| AdalError::internal("COMMIT", e)) })
                .await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback failed after {:?}: {}", err.kind(), rollback);
            }
            if err.kind() == ErrorKind::Cancelled {
                debug!("Transaction rolled back after cancellation");
            }
            Err(err)
        }
    }
}

/// Normalise a caller-supplied write time: the zero instant means "now", and stored
/// times are UTC at millisecond resolution
pub fn stamp(now: DateTime<Utc>) -> DateTime<Utc> {
    let now = if now == DateTime::<Utc>::default() {
        Utc::now()
    } else {
        now
    };
    now.trunc_subsecs(3)
}

/// Executes built statements: rebinding, logging, cancellation and driver error mapping
pub struct Runner<'a> {
    ctx: &'a Context,
    settings: &'a StoreSettings,
    unique_fields: &'static [(&'static str, &'static str)],
}

impl<'a> Runner<'a> {
    fn prepare(&self, statement: Statement) -> Result<Statement, AdalError> {
        let original = statement.sql.clone();
        let statement = statement
            .rebind(self.settings.dialect)
            .map_err(|e| AdalError::internal(original, e))?;
        if self.settings.enable_query_logging {
            debug!("SQL: {}", statement.sql);
        }
        Ok(statement)
    }

    fn observe(&self, sql: &str, started: Instant) {
        let elapsed = started.elapsed();
        if self.settings.enable_slow_query_warning && elapsed > self.settings.slow_query_threshold {
            warn!("Slow query ({} ms): {}", elapsed.as_millis(), sql);
        }
    }

    pub async fn fetch_all<T>(&self, conn: &mut PgConnection, statement: Statement) -> Result<Vec<T>, AdalError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let Statement { sql, args } = self.prepare(statement)?;
        let started = Instant::now();
        let result = self
            .ctx
            .run(async {
                let query = args
                    .into_iter()
                    .fold(sqlx::query_as::<_, T>(&sql), bind_param_query_as);
                query
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(|e| AdalError::from_driver(e, &sql, self.unique_fields))
            })
            .await;
        self.observe(&sql, started);
        result
    }

    pub async fn fetch_optional<T>(
        &self,
        conn: &mut PgConnection,
        statement: Statement,
    ) -> Result<Option<T>, AdalError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let Statement { sql, args } = self.prepare(statement)?;
        let started = Instant::now();
        let result = self
            .ctx
            .run(async {
                let query = args
                    .into_iter()
                    .fold(sqlx::query_as::<_, T>(&sql), bind_param_query_as);
                query
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(|e| AdalError::from_driver(e, &sql, self.unique_fields))
            })
            .await;
        self.observe(&sql, started);
        result
    }

    /// Execute and return the number of affected rows
    pub async fn execute(&self, conn: &mut PgConnection, statement: Statement) -> Result<u64, AdalError> {
        let Statement { sql, args } = self.prepare(statement)?;
        let started = Instant::now();
        let result = self
            .ctx
            .run(async {
                let query = args.into_iter().fold(sqlx::query(&sql), bind_param_query);
                query
                    .execute(&mut *conn)
                    .await
                    .map(|done| done.rows_affected())
                    .map_err(|e| AdalError::from_driver(e, &sql, self.unique_fields))
            })
            .await;
        self.observe(&sql, started);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn stamp_truncates_to_millis() {
        let t = Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap() + chrono::Duration::nanoseconds(123_456_789);
        let s = stamp(t);
        assert_eq!(s.nanosecond(), 123_000_000);
        assert_eq!(s.second(), 7);
    }

    #[test]
    fn zero_stamp_is_server_time() {
        let before = Utc::now() - chrono::Duration::seconds(1);
        let s = stamp(DateTime::<Utc>::default());
        assert!(s > before);
        assert_eq!(s.nanosecond() % 1_000_000, 0);
    }

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::production();
        config.filter.max_limit = 0;
        let settings = StoreSettings::from_config(&config);
        assert_eq!(settings.max_limit, 1000);
        assert_eq!(settings.dialect, Dialect::Dollar);
        assert_eq!(settings.slow_query_threshold, Duration::from_millis(1000));
    }
}
