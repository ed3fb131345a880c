#![allow(dead_code)]

use std::sync::Once;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use saas_adal::testing::TestDatabase;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A throwaway database, or `None` (with a notice) when DATABASE_URL is unset
pub async fn database(test: &str) -> Result<Option<TestDatabase>> {
    init_tracing();
    let db = TestDatabase::create().await?;
    if db.is_none() {
        eprintln!("skipping {}: DATABASE_URL not set", test);
    }
    Ok(db)
}

/// Fixed base instant for deterministic timestamps
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// Run `body` against a fresh database and always drop it afterwards
#[macro_export]
macro_rules! with_db {
    ($name:expr, |$db:ident| $body:block) => {{
        let Some($db) = common::database($name).await? else {
            return Ok(());
        };
        let result: anyhow::Result<()> = async { $body }.await;
        $db.cleanup().await?;
        result
    }};
}
