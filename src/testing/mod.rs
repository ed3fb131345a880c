//! Deterministic clocks, canned claims, fixture generators and a throwaway database for tests.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::{Executor, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Claims;
use crate::config::AppConfig;
use crate::context::Context;
use crate::database::manager::DatabaseManager;
use crate::database::models::{
    Account, AccountCreateRequest, AccountPreference, AccountPreferenceSetRequest, PreferenceName, User,
    UserAccount, UserAccountCreateRequest, UserCreateRequest,
};
use crate::database::repository::Store;
use crate::repositories::{AccountPreferenceRepository, AccountRepository, UserAccountRepository, UserRepository};

/// Schema applied to every throwaway database
pub const SCHEMA_SQL: &str = include_str!("../../schema/schema.sql");

/// Password used by [`mock_user`]
pub const MOCK_PASSWORD: &str = "p@ss-W0rd";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    at: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at: Mutex::new(at) }
    }

    /// 2024-01-01T00:00:00Z
    pub fn epoch() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default())
    }

    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let mut at = self.at.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *at += by;
        *at
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.at.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.at.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub mod mock_claims {
    use crate::auth::{Claims, Role};

    /// Empty claims, bypassing every gate
    pub fn internal() -> Claims {
        Claims::internal()
    }

    pub fn member(account_id: &str, user_id: &str) -> Claims {
        Claims::new(account_id, user_id, vec![Role::User])
    }

    pub fn admin(account_id: &str, user_id: &str) -> Claims {
        Claims::new(account_id, user_id, vec![Role::Admin])
    }
}

/// A freshly created database with the schema applied. Dropped by [`TestDatabase::cleanup`].
pub struct TestDatabase {
    pub name: String,
    pub pool: PgPool,
    pub store: Store,
    admin: PgPool,
}

impl TestDatabase {
    /// `None` when `DATABASE_URL` is not set, so callers can skip
    pub async fn create() -> anyhow::Result<Option<Self>> {
        let _ = dotenvy::dotenv();
        let base = match DatabaseManager::database_url() {
            Ok(url) => url,
            Err(_) => return Ok(None),
        };
        let config = AppConfig::development();

        let admin_url = DatabaseManager::build_connection_string(&base, "postgres")?;
        let admin = DatabaseManager::connect_url(&admin_url, &config.database).await?;

        let name = format!("{}{}", DatabaseManager::TEST_DB_PREFIX, Uuid::new_v4().simple());
        DatabaseManager::create_database(&admin, &name).await?;

        let url = DatabaseManager::build_connection_string(&base, &name)?;
        let pool = DatabaseManager::connect_url(&url, &config.database).await?;
        pool.execute(SCHEMA_SQL).await?;
        info!("Prepared test database {}", name);

        let store = Store::from_config(pool.clone(), &config);
        Ok(Some(Self {
            name,
            pool,
            store,
            admin,
        }))
    }

    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new(self.store.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.store.clone())
    }

    pub fn memberships(&self) -> UserAccountRepository {
        UserAccountRepository::new(self.store.clone())
    }

    pub fn preferences(&self) -> AccountPreferenceRepository {
        AccountPreferenceRepository::new(self.store.clone())
    }

    pub async fn cleanup(self) -> anyhow::Result<()> {
        self.pool.close().await;
        if let Err(e) = DatabaseManager::drop_database(&self.admin, &self.name).await {
            warn!("Failed to drop test database {}: {}", self.name, e);
        }
        self.admin.close().await;
        Ok(())
    }
}

pub fn account_request(name: &str) -> AccountCreateRequest {
    AccountCreateRequest {
        name: name.to_string(),
        address1: "1 Main St".to_string(),
        address2: String::new(),
        city: "Anchorage".to_string(),
        region: "AK".to_string(),
        country: "US".to_string(),
        zipcode: "99501".to_string(),
        ..Default::default()
    }
}

pub fn user_request(email: &str) -> UserCreateRequest {
    UserCreateRequest {
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: email.to_string(),
        password: MOCK_PASSWORD.to_string(),
        password_confirm: MOCK_PASSWORD.to_string(),
        timezone: None,
    }
}

/// Account with a unique generated name, inserted with internal claims
pub async fn mock_account(db: &TestDatabase, now: DateTime<Utc>) -> anyhow::Result<Account> {
    let name = format!("Account {}", Uuid::new_v4().simple());
    Ok(db.accounts().create(&Context::new(), &Claims::internal(), &account_request(&name), now).await?)
}

/// User with a unique generated email and [`MOCK_PASSWORD`]
pub async fn mock_user(db: &TestDatabase, now: DateTime<Utc>) -> anyhow::Result<User> {
    let email = format!("{}@example.com", Uuid::new_v4().simple());
    Ok(db.users().create(&Context::new(), &Claims::internal(), &user_request(&email), now).await?)
}

pub async fn mock_membership(
    db: &TestDatabase,
    user: &User,
    account: &Account,
    roles: &[&str],
    now: DateTime<Utc>,
) -> anyhow::Result<UserAccount> {
    let req = UserAccountCreateRequest {
        user_id: user.id.clone(),
        account_id: account.id.clone(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        status: None,
    };
    Ok(db.memberships().create(&Context::new(), &Claims::internal(), &req, now).await?)
}

pub async fn mock_preference(
    db: &TestDatabase,
    account: &Account,
    name: PreferenceName,
    now: DateTime<Utc>,
) -> anyhow::Result<AccountPreference> {
    let req = AccountPreferenceSetRequest::new(account.id.as_str(), name, name.default_value());
    Ok(db.preferences().set(&Context::new(), &Claims::internal(), &req, now).await?)
}
