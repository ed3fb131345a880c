use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::info;

use super::{authorize_account, authorize_create, new_id, non_empty, single};
use super::{AccountPreferenceRepository, UserAccountRepository};
use crate::auth::gate::{self, Access};
use crate::auth::Claims;
use crate::context::Context;
use crate::database::models::{
    Account, AccountCreateRequest, AccountStatus, AccountUpdateRequest, ModelError, Table,
};
use crate::database::query_builder::{Delete, Insert, Predicate, Select, Update};
use crate::database::repository::{finish, stamp, Store};
use crate::error::AdalError;
use crate::filter::FindFilter;
use crate::validate::{is_uuid, require_uuid, validate_with, ValidationContext};

/// Accounts, with archive and delete cascading to memberships and preferences
#[derive(Debug, Clone)]
pub struct AccountRepository {
    store: Store,
    memberships: UserAccountRepository,
    preferences: AccountPreferenceRepository,
}

impl AccountRepository {
    pub fn new(store: Store) -> Self {
        Self {
            memberships: UserAccountRepository::new(store.clone()),
            preferences: AccountPreferenceRepository::new(store.clone()),
            store,
        }
    }

    pub async fn find(&self, ctx: &Context, claims: &Claims, filter: &FindFilter) -> Result<Vec<Account>, AdalError> {
        let mut select = filter.apply::<Account>(Select::from(Account::NAME, Account::COLUMNS), self.store.settings())?;
        if let Some(scope) = gate::list_scope(claims, "id") {
            select = select.and_where(scope);
        }
        let mut conn = self.store.acquire(ctx).await?;
        self.store.runner::<Account>(ctx).fetch_all(&mut conn, select.build()).await
    }

    /// Scoped find on the primary key; rows outside the caller's scope read as missing
    pub async fn read(
        &self,
        ctx: &Context,
        claims: &Claims,
        id: &str,
        include_archived: bool,
    ) -> Result<Account, AdalError> {
        require_uuid("id", id)?;
        let filter = FindFilter::new()
            .where_clause("id = ?", vec![id.into()])
            .include_archived(include_archived);
        let rows = self.find(ctx, claims, &filter).await?;
        single(rows, &format!("account {}", id), "SELECT FROM accounts WHERE id = ?")
    }

    /// True when no live account other than `exclude_id` uses `name`
    pub async fn unique_name(&self, ctx: &Context, name: &str, exclude_id: Option<&str>) -> Result<bool, AdalError> {
        let mut select = Select::from(Account::NAME, &["id"])
            .and_where(Predicate::eq("name", name))
            .and_where(Predicate::is_null("archived_at"));
        if let Some(id) = exclude_id {
            select = select.and_where(Predicate::not_eq("id", id));
        }
        let mut conn = self.store.acquire(ctx).await?;
        let rows: Vec<(String,)> = self.store.runner::<Account>(ctx).fetch_all(&mut conn, select.build()).await?;
        Ok(rows.is_empty())
    }

    pub async fn create(
        &self,
        ctx: &Context,
        claims: &Claims,
        req: &AccountCreateRequest,
        now: DateTime<Utc>,
    ) -> Result<Account, AdalError> {
        let unique = req.name.is_empty() || self.unique_name(ctx, &req.name, None).await?;
        let vctx = ValidationContext::new().with_unique("name", unique);
        validate_with(&vctx, req)?;
        authorize_create(claims, "account")?;

        let mut conn = self.store.acquire(ctx).await?;
        self.insert(ctx, &mut conn, req, now).await
    }

    /// Insert an already validated request on `conn`
    pub(crate) async fn insert(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        req: &AccountCreateRequest,
        now: DateTime<Utc>,
    ) -> Result<Account, AdalError> {
        let now = stamp(now);
        let status = match req.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => s.parse::<AccountStatus>().map_err(|e| AdalError::bad_request("status", "oneof", e.to_string()))?,
            None => AccountStatus::Pending,
        };
        let account = Account {
            id: new_id(),
            name: req.name.clone(),
            address1: req.address1.clone(),
            address2: req.address2.clone(),
            city: req.city.clone(),
            region: req.region.clone(),
            country: req.country.clone(),
            zipcode: req.zipcode.clone(),
            status,
            timezone: non_empty(&req.timezone).unwrap_or_else(|| Account::DEFAULT_TIMEZONE.to_string()),
            signup_user_id: non_empty(&req.signup_user_id),
            billing_user_id: non_empty(&req.billing_user_id),
            created_at: now,
            updated_at: now,
            archived_at: None,
        };

        let statement = Insert::into_table(Account::NAME)
            .value("id", &account.id)
            .value("name", &account.name)
            .value("address1", &account.address1)
            .value("address2", &account.address2)
            .value("city", &account.city)
            .value("region", &account.region)
            .value("country", &account.country)
            .value("zipcode", &account.zipcode)
            .value("status", account.status.as_str())
            .value("timezone", &account.timezone)
            .value("signup_user_id", account.signup_user_id.clone())
            .value("billing_user_id", account.billing_user_id.clone())
            .value("created_at", account.created_at)
            .value("updated_at", account.updated_at)
            .build();
        self.store.runner::<Account>(ctx).execute(conn, statement).await?;
        Ok(account)
    }

    /// Apply the non-null fields of `req`; nothing set is a no-op
    pub async fn update(
        &self,
        ctx: &Context,
        claims: &Claims,
        req: &AccountUpdateRequest,
        now: DateTime<Utc>,
    ) -> Result<(), AdalError> {
        let unique = match req.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) if is_uuid(&req.id) => self.unique_name(ctx, name, Some(&req.id)).await?,
            _ => true,
        };
        let vctx = ValidationContext::new().with_unique("name", unique);
        validate_with(&vctx, req)?;

        let mut conn = self.store.acquire(ctx).await?;
        authorize_account(&self.store, ctx, &mut conn, claims, &req.id, Access::Modify).await?;

        let mut update = Update::table(Account::NAME).and_where(Predicate::eq("id", req.id.as_str()));
        let text_fields = [
            ("name", &req.name),
            ("address1", &req.address1),
            ("address2", &req.address2),
            ("city", &req.city),
            ("region", &req.region),
            ("country", &req.country),
            ("zipcode", &req.zipcode),
            ("timezone", &req.timezone),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value {
                update.set_mut(column, value.as_str());
            }
        }
        if req.signup_user_id.is_some() {
            update.set_mut("signup_user_id", non_empty(&req.signup_user_id));
        }
        if req.billing_user_id.is_some() {
            update.set_mut("billing_user_id", non_empty(&req.billing_user_id));
        }
        if let Some(next) = req.status.as_deref().filter(|s| !s.is_empty()) {
            let next: AccountStatus = next
                .parse()
                .map_err(|e: ModelError| AdalError::bad_request("status", "oneof", e.to_string()))?;
            let current = self.current_status(ctx, &mut conn, &req.id).await?;
            if !current.can_transition_to(next) {
                return Err(AdalError::bad_request(
                    "status",
                    "transition",
                    format!("status cannot change from {} to {}", current, next),
                ));
            }
            update.set_mut("status", next.as_str());
        }

        if update.is_empty() {
            return Ok(());
        }
        update.set_mut("updated_at", stamp(now));

        let affected = self.store.runner::<Account>(ctx).execute(&mut conn, update.build()).await?;
        if affected == 0 {
            return Err(AdalError::not_found(format!("account {}", req.id)));
        }
        Ok(())
    }

    async fn current_status(&self, ctx: &Context, conn: &mut PgConnection, id: &str) -> Result<AccountStatus, AdalError> {
        let select = Select::from(Account::NAME, &["status"]).and_where(Predicate::eq("id", id));
        let row: Option<(String,)> = self.store.runner::<Account>(ctx).fetch_optional(conn, select.build()).await?;
        let (status,) = row.ok_or_else(|| AdalError::not_found(format!("account {}", id)))?;
        status
            .parse()
            .map_err(|e: ModelError| AdalError::invariant("SELECT status FROM accounts", e.to_string()))
    }

    /// Soft-remove the account and every membership pointing at it
    pub async fn archive(&self, ctx: &Context, claims: &Claims, id: &str, now: DateTime<Utc>) -> Result<(), AdalError> {
        require_uuid("id", id)?;
        let now = stamp(now);
        let mut tx = self.store.begin(ctx).await?;
        let result = self.archive_in(ctx, &mut tx, claims, id, now).await;
        finish(ctx, tx, result).await
    }

    async fn archive_in(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        claims: &Claims,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AdalError> {
        authorize_account(&self.store, ctx, conn, claims, id, Access::Modify).await?;
        let statement = Update::table(Account::NAME)
            .set("archived_at", now)
            .and_where(Predicate::eq("id", id))
            .build();
        if self.store.runner::<Account>(ctx).execute(conn, statement).await? == 0 {
            return Err(AdalError::not_found(format!("account {}", id)));
        }
        self.memberships.archive_by_account_in(ctx, conn, id, now).await?;
        info!("Archived account {}", id);
        Ok(())
    }

    /// Hard delete: memberships, then preferences, then the account row, in one transaction
    pub async fn delete(&self, ctx: &Context, claims: &Claims, id: &str) -> Result<(), AdalError> {
        require_uuid("id", id)?;
        let mut tx = self.store.begin(ctx).await?;
        let result = self.delete_in(ctx, &mut tx, claims, id).await;
        finish(ctx, tx, result).await
    }

    async fn delete_in(&self, ctx: &Context, conn: &mut PgConnection, claims: &Claims, id: &str) -> Result<(), AdalError> {
        authorize_account(&self.store, ctx, conn, claims, id, Access::Modify).await?;
        self.memberships.delete_by_account_in(ctx, conn, id).await?;
        self.preferences.delete_by_account_in(ctx, conn, id).await?;
        let statement = Delete::from(Account::NAME).and_where(Predicate::eq("id", id)).build();
        if self.store.runner::<Account>(ctx).execute(conn, statement).await? == 0 {
            return Err(AdalError::not_found(format!("account {}", id)));
        }
        info!("Deleted account {}", id);
        Ok(())
    }
}
