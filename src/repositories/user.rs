use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{debug, info};

use super::{authorize_create, authorize_user, new_id, non_empty, single, UserAccountRepository};
use crate::auth::gate::{self, Access};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::Claims;
use crate::context::Context;
use crate::database::models::{Table, User, UserCreateRequest, UserUpdatePasswordRequest, UserUpdateRequest};
use crate::database::query_builder::{Delete, Insert, Predicate, Select, Update};
use crate::database::repository::{finish, stamp, Store};
use crate::error::AdalError;
use crate::filter::FindFilter;
use crate::validate::{is_uuid, require_uuid, validate, validate_with, ValidationContext};

/// Users. `password_hash` is written here and read only by [`UserRepository::verify_password`].
#[derive(Debug, Clone)]
pub struct UserRepository {
    store: Store,
    memberships: UserAccountRepository,
}

impl UserRepository {
    pub fn new(store: Store) -> Self {
        Self {
            memberships: UserAccountRepository::new(store.clone()),
            store,
        }
    }

    pub async fn find(&self, ctx: &Context, claims: &Claims, filter: &FindFilter) -> Result<Vec<User>, AdalError> {
        let mut select = filter.apply::<User>(Select::from(User::NAME, User::COLUMNS), self.store.settings())?;
        if let Some(scope) = gate::user_list_scope(claims) {
            select = select.and_where(scope);
        }
        let mut conn = self.store.acquire(ctx).await?;
        self.store.runner::<User>(ctx).fetch_all(&mut conn, select.build()).await
    }

    pub async fn read(&self, ctx: &Context, claims: &Claims, id: &str, include_archived: bool) -> Result<User, AdalError> {
        require_uuid("id", id)?;
        let filter = FindFilter::new()
            .where_clause("id = ?", vec![id.into()])
            .include_archived(include_archived);
        let rows = self.find(ctx, claims, &filter).await?;
        single(rows, &format!("user {}", id), "SELECT FROM users WHERE id = ?")
    }

    /// True when no live user other than `exclude_id` uses `email`
    pub async fn unique_email(&self, ctx: &Context, email: &str, exclude_id: Option<&str>) -> Result<bool, AdalError> {
        let mut select = Select::from(User::NAME, &["id"])
            .and_where(Predicate::eq("email", email))
            .and_where(Predicate::is_null("archived_at"));
        if let Some(id) = exclude_id {
            select = select.and_where(Predicate::not_eq("id", id));
        }
        let mut conn = self.store.acquire(ctx).await?;
        let rows: Vec<(String,)> = self.store.runner::<User>(ctx).fetch_all(&mut conn, select.build()).await?;
        Ok(rows.is_empty())
    }

    pub async fn create(
        &self,
        ctx: &Context,
        claims: &Claims,
        req: &UserCreateRequest,
        now: DateTime<Utc>,
    ) -> Result<User, AdalError> {
        let unique = req.email.is_empty() || self.unique_email(ctx, &req.email, None).await?;
        let vctx = ValidationContext::new().with_unique("email", unique);
        validate_with(&vctx, req)?;
        authorize_create(claims, "user")?;

        let mut conn = self.store.acquire(ctx).await?;
        self.insert(ctx, &mut conn, req, now).await
    }

    /// Hash the password and insert an already validated request on `conn`
    pub(crate) async fn insert(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        req: &UserCreateRequest,
        now: DateTime<Utc>,
    ) -> Result<User, AdalError> {
        let now = stamp(now);
        let password_hash = hash_password(&req.password, self.store.settings().bcrypt_cost)?;
        let user = User {
            id: new_id(),
            first_name: req.first_name.clone(),
            last_name: req.last_name.clone(),
            email: req.email.clone(),
            timezone: non_empty(&req.timezone).unwrap_or_else(|| User::DEFAULT_TIMEZONE.to_string()),
            created_at: now,
            updated_at: now,
            archived_at: None,
        };

        let statement = Insert::into_table(User::NAME)
            .value("id", &user.id)
            .value("first_name", &user.first_name)
            .value("last_name", &user.last_name)
            .value("email", &user.email)
            .value("password_hash", password_hash)
            .value("timezone", &user.timezone)
            .value("created_at", user.created_at)
            .value("updated_at", user.updated_at)
            .build();
        self.store.runner::<User>(ctx).execute(conn, statement).await?;
        Ok(user)
    }

    pub async fn update(
        &self,
        ctx: &Context,
        claims: &Claims,
        req: &UserUpdateRequest,
        now: DateTime<Utc>,
    ) -> Result<(), AdalError> {
        let unique = match req.email.as_deref().filter(|e| !e.is_empty()) {
            Some(email) if is_uuid(&req.id) => self.unique_email(ctx, email, Some(&req.id)).await?,
            _ => true,
        };
        let vctx = ValidationContext::new().with_unique("email", unique);
        validate_with(&vctx, req)?;

        let mut conn = self.store.acquire(ctx).await?;
        authorize_user(&self.store, ctx, &mut conn, claims, &req.id, Access::Modify).await?;

        let mut update = Update::table(User::NAME).and_where(Predicate::eq("id", req.id.as_str()));
        let fields = [
            ("first_name", &req.first_name),
            ("last_name", &req.last_name),
            ("email", &req.email),
            ("timezone", &req.timezone),
        ];
        for (column, value) in fields {
            if let Some(value) = value {
                update.set_mut(column, value.as_str());
            }
        }
        if update.is_empty() {
            return Ok(());
        }
        update.set_mut("updated_at", stamp(now));

        if self.store.runner::<User>(ctx).execute(&mut conn, update.build()).await? == 0 {
            return Err(AdalError::not_found(format!("user {}", req.id)));
        }
        Ok(())
    }

    pub async fn update_password(
        &self,
        ctx: &Context,
        claims: &Claims,
        req: &UserUpdatePasswordRequest,
        now: DateTime<Utc>,
    ) -> Result<(), AdalError> {
        validate(req)?;
        let mut conn = self.store.acquire(ctx).await?;
        authorize_user(&self.store, ctx, &mut conn, claims, &req.id, Access::Modify).await?;

        let password_hash = hash_password(&req.password, self.store.settings().bcrypt_cost)?;
        let statement = Update::table(User::NAME)
            .set("password_hash", password_hash)
            .set("updated_at", stamp(now))
            .and_where(Predicate::eq("id", req.id.as_str()))
            .and_where(Predicate::is_null("archived_at"))
            .build();
        if self.store.runner::<User>(ctx).execute(&mut conn, statement).await? == 0 {
            return Err(AdalError::not_found(format!("user {}", req.id)));
        }
        info!("Password changed for user {}", req.id);
        Ok(())
    }

    /// The live user with `email` when `password` matches its stored hash
    pub async fn verify_password(&self, ctx: &Context, email: &str, password: &str) -> Result<User, AdalError> {
        let select = Select::from(User::NAME, &["id", "password_hash"])
            .and_where(Predicate::eq("email", email))
            .and_where(Predicate::is_null("archived_at"));
        let mut conn = self.store.acquire(ctx).await?;
        let row: Option<(String, String)> =
            self.store.runner::<User>(ctx).fetch_optional(&mut conn, select.build()).await?;
        drop(conn);

        match row {
            Some((id, hashed)) if verify_password(password, &hashed) => {
                self.read(ctx, &Claims::internal(), &id, false).await
            }
            _ => {
                debug!("Password check failed for {}", email);
                Err(AdalError::not_found(format!("user {}", email)))
            }
        }
    }

    /// Soft-remove the user together with their memberships
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
        authorize_user(&self.store, ctx, conn, claims, id, Access::Modify).await?;
        let statement = Update::table(User::NAME)
            .set("archived_at", now)
            .and_where(Predicate::eq("id", id))
            .build();
        if self.store.runner::<User>(ctx).execute(conn, statement).await? == 0 {
            return Err(AdalError::not_found(format!("user {}", id)));
        }
        self.memberships.archive_by_user_in(ctx, conn, id, now).await?;
        info!("Archived user {}", id);
        Ok(())
    }

    /// Hard delete: memberships first, then the user row
    pub async fn delete(&self, ctx: &Context, claims: &Claims, id: &str) -> Result<(), AdalError> {
        require_uuid("id", id)?;
        let mut tx = self.store.begin(ctx).await?;
        let result = self.delete_in(ctx, &mut tx, claims, id).await;
        finish(ctx, tx, result).await
    }

    async fn delete_in(&self, ctx: &Context, conn: &mut PgConnection, claims: &Claims, id: &str) -> Result<(), AdalError> {
        authorize_user(&self.store, ctx, conn, claims, id, Access::Modify).await?;
        self.memberships.delete_by_user_in(ctx, conn, id).await?;
        let statement = Delete::from(User::NAME).and_where(Predicate::eq("id", id)).build();
        if self.store.runner::<User>(ctx).execute(conn, statement).await? == 0 {
            return Err(AdalError::not_found(format!("user {}", id)));
        }
        info!("Deleted user {}", id);
        Ok(())
    }
}
