use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{debug, info};

use super::{authorize_account, single};
use crate::auth::gate::{self, Access};
use crate::auth::Claims;
use crate::context::Context;
use crate::database::models::{AccountPreference, AccountPreferenceSetRequest, PreferenceName, Table};
use crate::database::query_builder::{Assignment, Delete, Insert, Predicate, Select, SqlValue, Update};
use crate::database::repository::{stamp, Store};
use crate::error::AdalError;
use crate::filter::FindFilter;
use crate::validate::{require_uuid, validate_with, ValidationContext};

const PRIMARY_KEY: &str = "account_preferences_pkey";

#[derive(Debug, Clone)]
pub struct AccountPreferenceRepository {
    store: Store,
}

impl AccountPreferenceRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn find(
        &self,
        ctx: &Context,
        claims: &Claims,
        filter: &FindFilter,
    ) -> Result<Vec<AccountPreference>, AdalError> {
        let mut select = filter.apply::<AccountPreference>(
            Select::from(AccountPreference::NAME, AccountPreference::COLUMNS),
            self.store.settings(),
        )?;
        if let Some(scope) = gate::list_scope(claims, "account_id") {
            select = select.and_where(scope);
        }
        let mut conn = self.store.acquire(ctx).await?;
        self.store.runner::<AccountPreference>(ctx).fetch_all(&mut conn, select.build()).await
    }

    pub async fn find_by_account_id(
        &self,
        ctx: &Context,
        claims: &Claims,
        account_id: &str,
    ) -> Result<Vec<AccountPreference>, AdalError> {
        require_uuid("account_id", account_id)?;
        let filter = FindFilter::new()
            .where_clause("account_id = ?", vec![account_id.into()])
            .order(["name asc"]);
        self.find(ctx, claims, &filter).await
    }

    pub async fn read(
        &self,
        ctx: &Context,
        claims: &Claims,
        account_id: &str,
        name: PreferenceName,
        include_archived: bool,
    ) -> Result<AccountPreference, AdalError> {
        require_uuid("account_id", account_id)?;
        let filter = FindFilter::new()
            .where_clause("account_id = ? AND name = ?", vec![account_id.into(), name.as_str().into()])
            .include_archived(include_archived);
        let rows = self.find(ctx, claims, &filter).await?;
        single(
            rows,
            &format!("preference {} of account {}", name, account_id),
            "SELECT FROM account_preferences WHERE account_id = ? AND name = ?",
        )
    }

    /// Insert or overwrite a preference. An archived row is restored.
    pub async fn set(
        &self,
        ctx: &Context,
        claims: &Claims,
        req: &AccountPreferenceSetRequest,
        now: DateTime<Utc>,
    ) -> Result<AccountPreference, AdalError> {
        let vctx = ValidationContext::new().with_preference(req.preference_name());
        validate_with(&vctx, req)?;
        let name = req
            .preference_name()
            .ok_or_else(|| AdalError::bad_request("name", "oneof", format!("unknown preference {}", req.name)))?;

        let mut conn = self.store.acquire(ctx).await?;
        authorize_account(&self.store, ctx, &mut conn, claims, &req.account_id, Access::Modify).await?;

        let now = stamp(now);
        let statement = Insert::into_table(AccountPreference::NAME)
            .value("account_id", &req.account_id)
            .value("name", name.as_str())
            .value("value", &req.value)
            .value("created_at", now)
            .value("updated_at", now)
            .on_conflict_update(
                PRIMARY_KEY,
                vec![
                    Assignment::Excluded("value"),
                    Assignment::Excluded("updated_at"),
                    Assignment::Value("archived_at", SqlValue::null_timestamp()),
                ],
            )
            .build();
        self.store.runner::<AccountPreference>(ctx).execute(&mut conn, statement).await?;
        debug!("Set preference {} on account {}", name, req.account_id);

        self.fetch(ctx, &mut conn, &req.account_id, name)
            .await?
            .ok_or_else(|| AdalError::invariant("INSERT INTO account_preferences", "upserted row not visible"))
    }

    async fn fetch(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        account_id: &str,
        name: PreferenceName,
    ) -> Result<Option<AccountPreference>, AdalError> {
        let select = Select::from(AccountPreference::NAME, AccountPreference::COLUMNS)
            .and_where(Predicate::eq("account_id", account_id))
            .and_where(Predicate::eq("name", name.as_str()));
        self.store.runner::<AccountPreference>(ctx).fetch_optional(conn, select.build()).await
    }

    pub async fn archive(
        &self,
        ctx: &Context,
        claims: &Claims,
        account_id: &str,
        name: PreferenceName,
        now: DateTime<Utc>,
    ) -> Result<(), AdalError> {
        require_uuid("account_id", account_id)?;
        let mut conn = self.store.acquire(ctx).await?;
        authorize_account(&self.store, ctx, &mut conn, claims, account_id, Access::Modify).await?;
        let statement = Update::table(AccountPreference::NAME)
            .set("archived_at", stamp(now))
            .and_where(Predicate::eq("account_id", account_id))
            .and_where(Predicate::eq("name", name.as_str()))
            .build();
        if self.store.runner::<AccountPreference>(ctx).execute(&mut conn, statement).await? == 0 {
            return Err(AdalError::not_found(format!("preference {} of account {}", name, account_id)));
        }
        info!("Archived preference {} of account {}", name, account_id);
        Ok(())
    }

    pub async fn delete(
        &self,
        ctx: &Context,
        claims: &Claims,
        account_id: &str,
        name: PreferenceName,
    ) -> Result<(), AdalError> {
        require_uuid("account_id", account_id)?;
        let mut conn = self.store.acquire(ctx).await?;
        authorize_account(&self.store, ctx, &mut conn, claims, account_id, Access::Modify).await?;
        let statement = Delete::from(AccountPreference::NAME)
            .and_where(Predicate::eq("account_id", account_id))
            .and_where(Predicate::eq("name", name.as_str()))
            .build();
        if self.store.runner::<AccountPreference>(ctx).execute(&mut conn, statement).await? == 0 {
            return Err(AdalError::not_found(format!("preference {} of account {}", name, account_id)));
        }
        info!("Deleted preference {} of account {}", name, account_id);
        Ok(())
    }

    pub(crate) async fn delete_by_account_in(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        account_id: &str,
    ) -> Result<u64, AdalError> {
        let statement = Delete::from(AccountPreference::NAME)
            .and_where(Predicate::eq("account_id", account_id))
            .build();
        let deleted = self.store.runner::<AccountPreference>(ctx).execute(conn, statement).await?;
        debug!("Deleted {} preferences of account {}", deleted, account_id);
        Ok(deleted)
    }
}

/// Effective format for `name`: the live row's value, else the built-in default
pub fn effective_value(preferences: &[AccountPreference], name: PreferenceName) -> &str {
    preferences
        .iter()
        .find(|p| p.name == name && p.archived_at.is_none())
        .map(|p| p.value.as_str())
        .unwrap_or_else(|| name.default_value())
}
