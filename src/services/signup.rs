use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::info;

use crate::auth::Role;
use crate::context::Context;
use validator::Validate;

use crate::database::models::{
    Account, AccountCreateRequest, AccountStatus, User, UserAccount, UserAccountCreateRequest, UserCreateRequest,
};
use crate::database::repository::{finish, stamp, Store};
use crate::error::AdalError;
use crate::repositories::{non_empty, AccountRepository, UserAccountRepository, UserRepository};
use crate::validate::{validate_with, ValidationContext};

/// First account plus its first user. Signup and billing references on `account` are
/// ignored and replaced by the new user; the account starts active.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(context = ValidationContext)]
pub struct SignupRequest {
    #[validate(nested)]
    pub account: AccountCreateRequest,
    #[validate(nested)]
    pub user: UserCreateRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupResult {
    pub account: Account,
    pub user: User,
    pub membership: UserAccount,
}

/// Creates a tenant in one transaction: user, then account, then an admin membership
#[derive(Debug, Clone)]
pub struct SignupService {
    store: Store,
    accounts: AccountRepository,
    users: UserRepository,
    memberships: UserAccountRepository,
}

impl SignupService {
    pub fn new(store: Store) -> Self {
        Self {
            accounts: AccountRepository::new(store.clone()),
            users: UserRepository::new(store.clone()),
            memberships: UserAccountRepository::new(store.clone()),
            store,
        }
    }

    pub async fn signup(&self, ctx: &Context, req: &SignupRequest, now: DateTime<Utc>) -> Result<SignupResult, AdalError> {
        let email_unique = req.user.email.is_empty() || self.users.unique_email(ctx, &req.user.email, None).await?;
        let name_unique = req.account.name.is_empty() || self.accounts.unique_name(ctx, &req.account.name, None).await?;

        let vctx = ValidationContext::new()
            .with_unique("email", email_unique)
            .with_unique("name", name_unique);
        validate_with(&vctx, req)?;

        let now = stamp(now);
        let mut tx = self.store.begin(ctx).await?;
        let result = self.signup_in(ctx, &mut tx, req, now).await;
        let result = finish(ctx, tx, result).await?;

        info!("Signed up account {} with user {}", result.account.id, result.user.id);
        Ok(result)
    }

    async fn signup_in(
        &self,
        ctx: &Context,
        conn: &mut PgConnection,
        req: &SignupRequest,
        now: DateTime<Utc>,
    ) -> Result<SignupResult, AdalError> {
        let user_req = UserCreateRequest {
            timezone: non_empty(&req.user.timezone).or_else(|| non_empty(&req.account.timezone)),
            ..req.user.clone()
        };
        let user = self
            .users
            .insert(ctx, conn, &user_req, now)
            .await
            .map_err(|e| e.prefixed("user"))?;

        let account_req = AccountCreateRequest {
            status: Some(AccountStatus::Active.as_str().to_string()),
            signup_user_id: Some(user.id.clone()),
            billing_user_id: Some(user.id.clone()),
            ..req.account.clone()
        };
        let account = self
            .accounts
            .insert(ctx, conn, &account_req, now)
            .await
            .map_err(|e| e.prefixed("account"))?;

        let membership_req = UserAccountCreateRequest {
            user_id: user.id.clone(),
            account_id: account.id.clone(),
            roles: vec![Role::Admin.as_str().to_string()],
            status: None,
        };
        let membership = self.memberships.insert(ctx, conn, &membership_req, now).await?;

        Ok(SignupResult {
            account,
            user,
            membership,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_decodes_nested_json() {
        let req: SignupRequest = serde_json::from_value(serde_json::json!({
            "account": {
                "name": "Acme",
                "address1": "1 Main St",
                "city": "Anchorage",
                "region": "AK",
                "country": "US",
                "zipcode": "99501"
            },
            "user": {
                "first_name": "Gabi",
                "last_name": "May",
                "email": "a@x",
                "password": "p@ss-W0rd",
                "password_confirm": "p@ss-W0rd"
            }
        }))
        .unwrap();
        assert_eq!(req.account.name, "Acme");
        assert_eq!(req.account.address2, "");
        assert_eq!(req.user.timezone, None);
    }

    #[test]
    fn nested_failures_are_prefixed() {
        let req = SignupRequest::default();
        let vctx = ValidationContext::new().with_unique("email", true).with_unique("name", true);
        let err = validate_with(&vctx, &req).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("account.name", "required"));
        assert!(errors.has("user.email", "required"));
        assert!(errors.has("user.password", "required"));
        assert!(!errors.has("name", "required"));
    }

    #[test]
    fn nested_unique_facts_reach_both_members() {
        let req = SignupRequest {
            account: crate::testing::account_request("Acme"),
            user: crate::testing::user_request("a@x"),
        };
        let vctx = ValidationContext::new().with_unique("email", false).with_unique("name", true);
        let err = validate_with(&vctx, &req).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("user.email", "unique"));
        assert_eq!(errors.len(), 1);
    }
}
