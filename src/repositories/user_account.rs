use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{debug, info};

use super::{authorize_account, new_id, single};
use crate::auth::gate::{self, Access};
use crate::auth::Claims;
use crate::context::Context;
use crate::database::models::{
    ModelError, Roles, Table, UserAccount, UserAccountCreateRequest, UserAccountStatus, UserAccountUpdateRequest,
};
use crate::database::query_builder::{Delete, Insert, OrderBy, Predicate, Select, SqlValue, Update};
use crate::database::repository::{stamp, Store};
use crate::error::AdalError;
use crate::filter::FindFilter;
use crate::validate::{require_uuid, validate};

/// Memberships. Every modify is gated as a modify of the membership's account.
#[derive(Debug, Clone)]
pub struct UserAccountRepository {
    store: Store,
}

impl UserAccountRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn find(&self, ctx: &Context, claims: &Claims, filter: &FindFilter) -> Result<Vec<UserAccount>, AdalError> {
        let mut select =
            filter.apply::<UserAccount>(Select::from(UserAccount::NAME, UserAccount::COLUMNS), self.store.settings())?;
        if let Some(scope) = gate::list_scope(claims, "account_id") {
            select = select.and_where(scope);
        }
        let mut conn = self.store.acquire(ctx).await?;
        self.store.runner::<UserAccount>(ctx).fetch_all(&mut conn, select.build()).await
    }

    pub async fn read(
        &self,
        ctx: &Context,
        claims: &Claims,
        id: &str,
        include_archived: bool,
    ) -> Result<UserAccount, AdalError> {
        require_uuid("id", id)?;
        let filter = FindFilter::new()
            .where_clause("id = ?", vec![id.into()])
            .include_archived(include_archived);
        let rows = self.find(ctx, claims, &filter).await?;
        single(rows, &format!("membership {}", id), "SELECT FROM users_accounts WHERE id = ?")
    }

    /// The live membership linking `user_id` to `account_id`
    pub async fn read_by_pair(
        &self,
        ctx: &Context,
        claims: &Claims,
        user_id: &str,
        account_id: &str,
    ) -> Result<UserAccount, AdalError> {
        require_uuid("user_id", user_id)?;
        require_uuid("account_id", account_id)?;
        let filter = FindFilter::new().where_clause(
            "user_id = ? AND account_id = ?",
            vec![user_id.into(), account_id.into()],
        );
        let rows = self.find(ctx, claims, &filter).await?;
        single(
            rows,
            &format!("membership of user {} in account {}", user_id, account_id),
            "SELECT FROM users_accounts WHERE user_id = ? AND account_id = ?",
        )
    }

    pub async fn find_by_user_id(&self, ctx: &Context, claims: &Claims, user_id: &str) -> Result<Vec<UserAccount>, AdalError> {
        require_uuid("user_id", user_id)?;
        let filter = FindFilter::new()
            .where_clause("user_id = ?", vec![user_id.into()])
            .order(["created_at asc"]);
        self.find(ctx, claims, &filter).await
    }

    pub async fn find_by_account_id(
        &self,
        ctx: &Context,
        claims: &Claims,
        account_id: &str,
    ) -> Result<Vec<UserAccount>, AdalError> {
        require_uuid("account_id", account_id)?;
        let filter = FindFilter::new()
            .where_clause("account_id = ?", vec![account_id.into()])
            .order(["created_at asc"]);
        self.find(ctx, claims, &filter).await
    }

    /// Link a user to an account. An archived link for the same pair is restored with the
    /// requested roles and status instead of inserting a second row.
    pub async fn create(
        &self,
        ctx: &Context,
        claims: &Claims,
        req: &UserAccountCreateRequest,
        now: DateTime<Utc>,
    ) -> Result<UserAccount, AdalError> {
        validate(req)?;
        let mut conn = self.store.acquire(ctx).await?;
        authorize_account(&self.store, ctx, &mut conn, claims, &req.account_id, Access::Modify).await?;

        let now = stamp(now);
        match self.latest_archived(ctx, &mut conn, &req.user_id, &req.account_id).await? {
            Some(mut existing) => {
                let (roles, status) = parse_membership(&req.roles, req.status.as_deref())?;
                let statement = Update::table(UserAccount::NAME)
                    .set("roles", roles.to_strings())
                    .set("status", status.as_str())
                    .set("updated_at", now)
                    .set("archived_at", SqlValue::null_timestamp())
                    .and_where(Predicate::eq("id", existing.id.as_str()))
                    .build();
                self.store.runner::<UserAccount>(ctx).execute(&mut conn, statement).await?;
                debug!("Restored archived membership {}", existing.id);
                existing.roles = roles;
                existing.status = status;
                existing.updated_at = now;
                existing.archived_at = None;
                Ok(existing)
            }
            None => self.insert(ctx, &mut conn, req, now).await,
        }
    }

    async fn latest_archived(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        user_id: &str,
        account_id: &str,
    ) -> Result<Option<UserAccount>, AdalError> {
        let select = Select::from(UserAccount::NAME, UserAccount::COLUMNS)
            .and_where(Predicate::eq("user_id", user_id))
            .and_where(Predicate::eq("account_id", account_id))
            .and_where(Predicate::is_not_null("archived_at"))
            .order_by(vec![OrderBy::desc("archived_at")])
            .limit(Some(1));
        self.store.runner::<UserAccount>(ctx).fetch_optional(conn, select.build()).await
    }

    /// Insert an already validated and authorised request on `conn`
    pub(crate) async fn insert(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        req: &UserAccountCreateRequest,
        now: DateTime<Utc>,
    ) -> Result<UserAccount, AdalError> {
        let now = stamp(now);
        let (roles, status) = parse_membership(&req.roles, req.status.as_deref())?;
        let membership = UserAccount {
            id: new_id(),
            user_id: req.user_id.clone(),
            account_id: req.account_id.clone(),
            roles,
            status,
            created_at: now,
            updated_at: now,
            archived_at: None,
        };
        let statement = Insert::into_table(UserAccount::NAME)
            .value("id", &membership.id)
            .value("user_id", &membership.user_id)
            .value("account_id", &membership.account_id)
            .value("roles", membership.roles.to_strings())
            .value("status", membership.status.as_str())
            .value("created_at", membership.created_at)
            .value("updated_at", membership.updated_at)
            .build();
        self.store.runner::<UserAccount>(ctx).execute(conn, statement).await?;
        Ok(membership)
    }

    /// Account the membership belongs to, whether or not it is archived
    async fn owning_account(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        claims: &Claims,
        id: &str,
    ) -> Result<String, AdalError> {
        let select = Select::from(UserAccount::NAME, &["account_id"]).and_where(Predicate::eq("id", id));
        let row: Option<(String,)> = self.store.runner::<UserAccount>(ctx).fetch_optional(conn, select.build()).await?;
        match row {
            Some((account_id,)) => Ok(account_id),
            None if claims.is_internal() => Err(AdalError::not_found(format!("membership {}", id))),
            // without a row there is no account to grant access through
            None => Err(AdalError::forbidden(format!("membership {}", id))),
        }
    }

    async fn authorize_membership(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        claims: &Claims,
        id: &str,
    ) -> Result<(), AdalError> {
        let account_id = self.owning_account(ctx, conn, claims, id).await?;
        authorize_account(&self.store, ctx, conn, claims, &account_id, Access::Modify).await
    }

    pub async fn update(
        &self,
        ctx: &Context,
        claims: &Claims,
        req: &UserAccountUpdateRequest,
        now: DateTime<Utc>,
    ) -> Result<(), AdalError> {
        validate(req)?;
        let mut conn = self.store.acquire(ctx).await?;
        self.authorize_membership(ctx, &mut conn, claims, &req.id).await?;

        let mut update = Update::table(UserAccount::NAME).and_where(Predicate::eq("id", req.id.as_str()));
        if let Some(roles) = req.roles.as_ref().filter(|r| !r.is_empty()) {
            let roles = Roles::try_from(roles.clone())
                .map_err(|e| AdalError::bad_request("roles", "oneof", e.to_string()))?;
            update.set_mut("roles", roles.to_strings());
        }
        if let Some(status) = req.status.as_deref().filter(|s| !s.is_empty()) {
            let status: UserAccountStatus = status
                .parse()
                .map_err(|e: ModelError| AdalError::bad_request("status", "oneof", e.to_string()))?;
            update.set_mut("status", status.as_str());
        }
        if update.is_empty() {
            return Ok(());
        }
        update.set_mut("updated_at", stamp(now));

        if self.store.runner::<UserAccount>(ctx).execute(&mut conn, update.build()).await? == 0 {
            return Err(AdalError::not_found(format!("membership {}", req.id)));
        }
        Ok(())
    }

    pub async fn archive(&self, ctx: &Context, claims: &Claims, id: &str, now: DateTime<Utc>) -> Result<(), AdalError> {
        require_uuid("id", id)?;
        let mut conn = self.store.acquire(ctx).await?;
        self.authorize_membership(ctx, &mut conn, claims, id).await?;
        let statement = Update::table(UserAccount::NAME)
            .set("archived_at", stamp(now))
            .and_where(Predicate::eq("id", id))
            .build();
        if self.store.runner::<UserAccount>(ctx).execute(&mut conn, statement).await? == 0 {
            return Err(AdalError::not_found(format!("membership {}", id)));
        }
        info!("Archived membership {}", id);
        Ok(())
    }

    pub async fn delete(&self, ctx: &Context, claims: &Claims, id: &str) -> Result<(), AdalError> {
        require_uuid("id", id)?;
        let mut conn = self.store.acquire(ctx).await?;
        self.authorize_membership(ctx, &mut conn, claims, id).await?;
        let statement = Delete::from(UserAccount::NAME).and_where(Predicate::eq("id", id)).build();
        if self.store.runner::<UserAccount>(ctx).execute(&mut conn, statement).await? == 0 {
            return Err(AdalError::not_found(format!("membership {}", id)));
        }
        info!("Deleted membership {}", id);
        Ok(())
    }

    /// Archive the live memberships matching `column = value`; part of a parent's cascade
    async fn archive_where(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        column: &'static str,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AdalError> {
        let statement = Update::table(UserAccount::NAME)
            .set("archived_at", now)
            .set("updated_at", now)
            .and_where(Predicate::eq(column, value))
            .and_where(Predicate::is_null("archived_at"))
            .build();
        let archived = self.store.runner::<UserAccount>(ctx).execute(conn, statement).await?;
        debug!("Archived {} memberships with {} {}", archived, column, value);
        Ok(archived)
    }

    async fn delete_where(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        column: &'static str,
        value: &str,
    ) -> Result<u64, AdalError> {
        let statement = Delete::from(UserAccount::NAME).and_where(Predicate::eq(column, value)).build();
        let deleted = self.store.runner::<UserAccount>(ctx).execute(conn, statement).await?;
        debug!("Deleted {} memberships with {} {}", deleted, column, value);
        Ok(deleted)
    }

    pub(crate) async fn archive_by_account_in(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AdalError> {
        self.archive_where(ctx, conn, "account_id", account_id, now).await
    }

    pub(crate) async fn archive_by_user_in(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AdalError> {
        self.archive_where(ctx, conn, "user_id", user_id, now).await
    }

    /// Removes archived and live rows alike
    pub(crate) async fn delete_by_account_in(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        account_id: &str,
    ) -> Result<u64, AdalError> {
        self.delete_where(ctx, conn, "account_id", account_id).await
    }

    pub(crate) async fn delete_by_user_in(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        user_id: &str,
    ) -> Result<u64, AdalError> {
        self.delete_where(ctx, conn, "user_id", user_id).await
    }
}

/// Roles and status of a validated request; status defaults to active
fn parse_membership(roles: &[String], status: Option<&str>) -> Result<(Roles, UserAccountStatus), AdalError> {
    let roles =
        Roles::try_from(roles.to_vec()).map_err(|e| AdalError::bad_request("roles", "oneof", e.to_string()))?;
    if roles.0.is_empty() {
        return Err(AdalError::bad_request("roles", "required", "roles is required"));
    }
    let status = match status.filter(|s| !s.is_empty()) {
        Some(s) => s
            .parse()
            .map_err(|e: ModelError| AdalError::bad_request("status", "oneof", e.to_string()))?,
        None => UserAccountStatus::Active,
    };
    Ok((roles, status))
}
