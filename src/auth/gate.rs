//! Row-level access decisions.
//!
//! Everything here is pure: repositories fetch the membership facts a decision needs (using the
//! lookup queries built here) and then ask for a [`Decision`]. List operations never consult facts;
//! they receive a scope predicate that the store evaluates.

use super::{Claims, Role};
use crate::database::query_builder::{Predicate, Select};

const MEMBERSHIPS: &str = "users_accounts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Modify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Internal caller, no checks apply
    Bypass,
    Allow,
    Forbidden,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Forbidden)
    }

    fn from_bool(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Forbidden
        }
    }
}

/// A live membership row linking two parties, if any
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MembershipFact {
    pub exists: bool,
    pub admin: bool,
}

impl MembershipFact {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn member(admin: bool) -> Self {
        Self { exists: true, admin }
    }

    /// Fold the role columns of the matching rows
    pub fn from_roles<'a>(rows: impl IntoIterator<Item = &'a [String]>) -> Self {
        rows.into_iter().fold(Self::none(), |fact, roles| Self {
            exists: true,
            admin: fact.admin || roles.iter().any(|r| r == Role::Admin.as_str()),
        })
    }
}

/// Whether the caller must present a membership fact for `account_id`. A bound admin session
/// is already sufficient for every access.
pub fn needs_account_fact(claims: &Claims, account_id: &str) -> bool {
    let bound_admin = claims.audience == account_id && claims.is_admin();
    !claims.is_internal() && !claims.subject.is_empty() && !bound_admin
}

/// Whether the caller must present a fact linking `user_id` to the caller's audience
pub fn needs_user_fact(claims: &Claims, user_id: &str) -> bool {
    !claims.is_internal() && !claims.audience.is_empty() && claims.subject != user_id
}

/// `SELECT roles FROM users_accounts WHERE account_id = ? AND user_id = ? AND archived_at IS NULL`
pub fn membership_lookup(account_id: &str, user_id: &str) -> Select {
    Select::from(MEMBERSHIPS, &["roles"])
        .and_where(Predicate::eq("account_id", account_id))
        .and_where(Predicate::eq("user_id", user_id))
        .and_where(Predicate::is_null("archived_at"))
}

/// Lookup for the caller's own membership in `account_id`
pub fn account_fact_query(claims: &Claims, account_id: &str) -> Select {
    membership_lookup(account_id, &claims.subject)
}

/// Lookup for `user_id`'s membership in the caller's audience account
pub fn user_fact_query(claims: &Claims, user_id: &str) -> Select {
    membership_lookup(&claims.audience, user_id)
}

/// Point decision on an account.
///
/// Read holds when the session is bound to the account or the subject is a member of it. Modify
/// additionally needs `admin`, either on the session (when bound to the account) or on the
/// membership row.
pub fn account_decision(claims: &Claims, account_id: &str, access: Access, fact: MembershipFact) -> Decision {
    if claims.is_internal() {
        return Decision::Bypass;
    }
    let bound = !claims.audience.is_empty() && claims.audience == account_id;
    let member = !claims.subject.is_empty() && fact.exists;

    let read = bound || member;
    match access {
        Access::Read => Decision::from_bool(read),
        Access::Modify => {
            Decision::from_bool(read && ((bound && claims.is_admin()) || (member && fact.admin)))
        }
    }
}

/// Point decision on a user. `fact` describes the target user's membership in the audience
/// account.
pub fn user_decision(claims: &Claims, user_id: &str, access: Access, fact: MembershipFact) -> Decision {
    if claims.is_internal() {
        return Decision::Bypass;
    }
    let is_self = !claims.subject.is_empty() && claims.subject == user_id;
    let shares_audience = !claims.audience.is_empty() && fact.exists;

    let read = is_self || shares_audience;
    match access {
        Access::Read => Decision::from_bool(read),
        Access::Modify => Decision::from_bool(is_self || (claims.is_admin() && read)),
    }
}

/// Creating a top-level row: internal callers bypass, tenant callers need `admin`
pub fn create_decision(claims: &Claims) -> Decision {
    if claims.is_internal() {
        Decision::Bypass
    } else {
        Decision::from_bool(claims.is_admin())
    }
}

/// OR of the non-empty claim branches over live memberships
fn scope_subquery(claims: &Claims, selected: &'static [&'static str]) -> Option<Select> {
    let mut branches = Vec::new();
    if !claims.audience.is_empty() {
        branches.push(Predicate::eq("account_id", claims.audience.as_str()));
    }
    if !claims.subject.is_empty() {
        branches.push(Predicate::eq("user_id", claims.subject.as_str()));
    }
    if branches.is_empty() {
        return None;
    }
    Some(
        Select::from(MEMBERSHIPS, selected)
            .and_where(Predicate::Or(branches))
            .and_where(Predicate::is_null("archived_at")),
    )
}

/// `column IN (SELECT account_id FROM users_accounts WHERE account_id = aud OR user_id = sub)`,
/// or `None` for internal callers
pub fn list_scope(claims: &Claims, column: &'static str) -> Option<Predicate> {
    scope_subquery(claims, &["account_id"]).map(|select| Predicate::in_select(column, select))
}

/// `id IN (SELECT user_id FROM users_accounts WHERE account_id = aud OR user_id = sub)`
pub fn user_list_scope(claims: &Claims) -> Option<Predicate> {
    scope_subquery(claims, &["user_id"]).map(|select| Predicate::in_select("id", select))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(audience: &str, subject: &str, admin: bool) -> Claims {
        let roles = if admin { vec![Role::Admin] } else { vec![Role::User] };
        Claims::new(audience, subject, roles)
    }

    #[test]
    fn internal_callers_bypass_everything() {
        let c = Claims::internal();
        for access in [Access::Read, Access::Modify] {
            assert_eq!(account_decision(&c, "acc9", access, MembershipFact::none()), Decision::Bypass);
            assert_eq!(user_decision(&c, "u9", access, MembershipFact::none()), Decision::Bypass);
        }
        assert_eq!(create_decision(&c), Decision::Bypass);
        assert!(list_scope(&c, "id").is_none());
        assert!(user_list_scope(&c).is_none());
    }

    #[test]
    fn account_decision_table() {
        let none = MembershipFact::none();
        let member = MembershipFact::member(false);
        let admin_member = MembershipFact::member(true);

        let cases = [
            // (claims, target, fact, read, modify)
            (claims("acc1", "u1", true), "acc1", none, true, true),
            (claims("acc1", "u1", false), "acc1", none, true, false),
            (claims("acc1", "u1", true), "acc2", none, false, false),
            (claims("acc1", "u1", true), "acc2", member, true, false),
            (claims("acc1", "u1", false), "acc2", admin_member, true, true),
            (claims("", "u1", false), "acc2", member, true, false),
            (claims("", "u1", false), "acc2", admin_member, true, true),
            (claims("acc1", "", true), "acc2", admin_member, false, false),
        ];

        for (c, target, fact, read, modify) in cases {
            assert_eq!(
                account_decision(&c, target, Access::Read, fact).is_allowed(),
                read,
                "read {:?} -> {}",
                c,
                target
            );
            assert_eq!(
                account_decision(&c, target, Access::Modify, fact).is_allowed(),
                modify,
                "modify {:?} -> {}",
                c,
                target
            );
        }
    }

    #[test]
    fn non_admin_never_modifies_without_admin_membership() {
        for target in ["acc1", "acc2"] {
            let c = claims("acc1", "u1", false);
            for fact in [MembershipFact::none(), MembershipFact::member(false)] {
                assert_eq!(account_decision(&c, target, Access::Modify, fact), Decision::Forbidden);
            }
        }
    }

    #[test]
    fn user_decision_table() {
        let c = claims("acc1", "u1", false);
        assert!(user_decision(&c, "u1", Access::Modify, MembershipFact::none()).is_allowed());
        assert!(user_decision(&c, "u2", Access::Read, MembershipFact::member(false)).is_allowed());
        assert!(!user_decision(&c, "u2", Access::Modify, MembershipFact::member(false)).is_allowed());
        assert!(!user_decision(&c, "u3", Access::Read, MembershipFact::none()).is_allowed());

        let admin = claims("acc1", "u1", true);
        assert!(user_decision(&admin, "u2", Access::Modify, MembershipFact::member(false)).is_allowed());
        assert!(!user_decision(&admin, "u3", Access::Modify, MembershipFact::none()).is_allowed());
    }

    #[test]
    fn create_needs_admin() {
        assert!(create_decision(&claims("acc1", "u1", true)).is_allowed());
        assert!(!create_decision(&claims("acc1", "u1", false)).is_allowed());
    }

    #[test]
    fn fact_needs() {
        let c = claims("acc1", "u1", false);
        assert!(needs_account_fact(&c, "acc1"));
        assert!(needs_account_fact(&c, "acc2"));
        assert!(!needs_account_fact(&claims("acc1", "u1", true), "acc1"));
        assert!(!needs_account_fact(&claims("acc1", "", true), "acc2"));
        assert!(!needs_user_fact(&c, "u1"));
        assert!(needs_user_fact(&c, "u2"));
        assert!(!needs_user_fact(&claims("", "u1", true), "u2"));
    }

    #[test]
    fn list_scope_renders_both_branches() {
        let scope = list_scope(&claims("acc1", "u1", false), "id").unwrap();
        let stmt = Select::from("accounts", &["id"]).and_where(scope).build();
        assert_eq!(
            stmt.sql,
            "SELECT id FROM accounts WHERE id IN (SELECT account_id FROM users_accounts \
             WHERE (account_id = ? OR user_id = ?) AND archived_at IS NULL)"
        );
        assert_eq!(stmt.args.len(), 2);
    }

    #[test]
    fn list_scope_omits_empty_branch() {
        let scope = list_scope(&claims("", "u1", false), "account_id").unwrap();
        let stmt = Select::from("account_preferences", &["account_id"]).and_where(scope).build();
        assert!(stmt.sql.contains("WHERE user_id = ? AND archived_at IS NULL"));
        assert!(!stmt.sql.contains("account_id = ?"));

        let scope = user_list_scope(&claims("acc1", "", false)).unwrap();
        let stmt = Select::from("users", &["id"]).and_where(scope).build();
        assert!(stmt.sql.contains("id IN (SELECT user_id FROM users_accounts WHERE account_id = ?"));
    }

    #[test]
    fn facts_fold_roles() {
        let admin = vec!["admin".to_string()];
        let user = vec!["user".to_string()];
        assert_eq!(MembershipFact::from_roles(Vec::<&[String]>::new()), MembershipFact::none());
        assert_eq!(MembershipFact::from_roles([user.as_slice()]), MembershipFact::member(false));
        assert_eq!(
            MembershipFact::from_roles([user.as_slice(), admin.as_slice()]),
            MembershipFact::member(true)
        );
    }
}
