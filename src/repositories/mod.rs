//! One repository per aggregate. Each holds the shared [`Store`] and exposes the
//! find / read / create / update / archive / delete contract, gated by caller claims.

pub mod account;
pub mod account_preference;
pub mod user;
pub mod user_account;

pub use account::AccountRepository;
pub use account_preference::AccountPreferenceRepository;
pub use user::UserRepository;
pub use user_account::UserAccountRepository;

use sqlx::PgConnection;
use tracing::debug;

use crate::auth::gate::{self, Access, Decision, MembershipFact};
use crate::auth::Claims;
use crate::context::Context;
use crate::database::models::UserAccount;
use crate::database::repository::Store;
use crate::error::AdalError;

/// Roles of the live membership rows the lookup matches
async fn load_fact(
    store: &Store,
    ctx: &Context,
    conn: &mut PgConnection,
    lookup: crate::database::query_builder::Select,
) -> Result<MembershipFact, AdalError> {
    let rows: Vec<(Vec<String>,)> = store.runner::<UserAccount>(ctx).fetch_all(conn, lookup.build()).await?;
    Ok(MembershipFact::from_roles(rows.iter().map(|(roles,)| roles.as_slice())))
}

/// Evaluate the account gate for `account_id`, fetching the caller's membership when needed
pub(crate) async fn authorize_account(
    store: &Store,
    ctx: &Context,
    conn: &mut PgConnection,
    claims: &Claims,
    account_id: &str,
    access: Access,
) -> Result<(), AdalError> {
    let fact = if gate::needs_account_fact(claims, account_id) {
        load_fact(store, ctx, conn, gate::account_fact_query(claims, account_id)).await?
    } else {
        MembershipFact::none()
    };
    match gate::account_decision(claims, account_id, access, fact) {
        Decision::Forbidden => {
            debug!("Denied {:?} on account {} for subject {:?}", access, account_id, claims.subject);
            Err(AdalError::forbidden(format!("account {}", account_id)))
        }
        Decision::Allow | Decision::Bypass => Ok(()),
    }
}

/// Evaluate the user gate for `user_id`, fetching the target's membership in the audience
pub(crate) async fn authorize_user(
    store: &Store,
    ctx: &Context,
    conn: &mut PgConnection,
    claims: &Claims,
    user_id: &str,
    access: Access,
) -> Result<(), AdalError> {
    let fact = if gate::needs_user_fact(claims, user_id) {
        load_fact(store, ctx, conn, gate::user_fact_query(claims, user_id)).await?
    } else {
        MembershipFact::none()
    };
    match gate::user_decision(claims, user_id, access, fact) {
        Decision::Forbidden => {
            debug!("Denied {:?} on user {} for subject {:?}", access, user_id, claims.subject);
            Err(AdalError::forbidden(format!("user {}", user_id)))
        }
        Decision::Allow | Decision::Bypass => Ok(()),
    }
}

pub(crate) fn authorize_create(claims: &Claims, kind: &str) -> Result<(), AdalError> {
    if gate::create_decision(claims).is_allowed() {
        Ok(())
    } else {
        debug!("Denied create of {} for subject {:?}", kind, claims.subject);
        Err(AdalError::forbidden(format!("create {}", kind)))
    }
}

/// Exactly one row or `NotFound`; more than one is a broken key invariant
pub(crate) fn single<T>(rows: Vec<T>, what: &str, statement: &str) -> Result<T, AdalError> {
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (Some(row), None) => Ok(row),
        (None, _) => Err(AdalError::not_found(what.to_string())),
        (Some(_), Some(_)) => Err(AdalError::invariant(statement, format!("{} matched more than one row", what))),
    }
}

/// Fresh textual identifier
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Empty optional references are stored as NULL
pub(crate) fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}
