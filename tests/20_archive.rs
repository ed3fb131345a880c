mod common;

use anyhow::Result;
use saas_adal::database::models::PreferenceName;
use saas_adal::filter::FindFilter;
use saas_adal::testing::{mock_account, mock_claims, mock_membership, mock_preference, mock_user};
use saas_adal::{Context, ErrorKind};

async fn count(db: &saas_adal::testing::TestDatabase, table: &str, account_id: &str) -> Result<i64> {
    let column = if table == "accounts" { "id" } else { "account_id" };
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = $1", table, column);
    let (n,): (i64,) = sqlx::query_as(&sql).bind(account_id).fetch_one(&db.pool).await?;
    Ok(n)
}

#[tokio::test]
async fn archive_hides_every_entity() -> Result<()> {
    with_db!("archive_hides_every_entity", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();
        let later = now + chrono::Duration::minutes(5);

        let account = mock_account(&db, now).await?;
        let user = mock_user(&db, now).await?;
        let membership = mock_membership(&db, &user, &account, &["admin"], now).await?;
        mock_preference(&db, &account, PreferenceName::DateFormat, now).await?;

        db.preferences().archive(&ctx, &internal, &account.id, PreferenceName::DateFormat, later).await?;
        let err = db
            .preferences()
            .read(&ctx, &internal, &account.id, PreferenceName::DateFormat, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let pref = db.preferences().read(&ctx, &internal, &account.id, PreferenceName::DateFormat, true).await?;
        assert_eq!(pref.archived_at, Some(later));

        db.memberships().archive(&ctx, &internal, &membership.id, later).await?;
        let err = db.memberships().read(&ctx, &internal, &membership.id, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(db.memberships().read(&ctx, &internal, &membership.id, true).await?.archived_at.is_some());

        db.users().archive(&ctx, &internal, &user.id, later).await?;
        let err = db.users().read(&ctx, &internal, &user.id, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(db.users().read(&ctx, &internal, &user.id, true).await?.archived_at, Some(later));

        db.accounts().archive(&ctx, &internal, &account.id, later).await?;
        let err = db.accounts().read(&ctx, &internal, &account.id, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(db.accounts().read(&ctx, &internal, &account.id, true).await?.archived_at, Some(later));
        Ok(())
    })
}

#[tokio::test]
async fn account_archive_cascades_to_memberships() -> Result<()> {
    with_db!("account_archive_cascades_to_memberships", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();
        let account = mock_account(&db, now).await?;
        let admin = mock_user(&db, now).await?;
        let member = mock_user(&db, now).await?;
        mock_membership(&db, &admin, &account, &["admin"], now).await?;
        mock_membership(&db, &member, &account, &["user"], now).await?;

        // the admin archives their own account
        db.accounts().archive(&ctx, &mock_claims::admin(&account.id, &admin.id), &account.id, now).await?;

        let live = db.memberships().find_by_account_id(&ctx, &internal, &account.id).await?;
        assert!(live.is_empty());
        let all = db
            .memberships()
            .find(
                &ctx,
                &internal,
                &FindFilter::new()
                    .where_clause("account_id = ?", vec![account.id.as_str().into()])
                    .include_archived(true),
            )
            .await?;
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|m| m.archived_at == Some(now)));
        Ok(())
    })
}

#[tokio::test]
async fn user_archive_cascades_to_memberships() -> Result<()> {
    with_db!("user_archive_cascades_to_memberships", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();
        let account = mock_account(&db, now).await?;
        let user = mock_user(&db, now).await?;
        let membership = mock_membership(&db, &user, &account, &["user"], now).await?;

        // users may archive themselves
        db.users().archive(&ctx, &mock_claims::member(&account.id, &user.id), &user.id, now).await?;
        assert!(db.memberships().find_by_user_id(&ctx, &internal, &user.id).await?.is_empty());
        assert!(db.memberships().read(&ctx, &internal, &membership.id, true).await?.archived_at.is_some());
        Ok(())
    })
}

#[tokio::test]
async fn delete_removes_account_and_dependents() -> Result<()> {
    with_db!("delete_removes_account_and_dependents", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();
        let account = mock_account(&db, now).await?;
        let keep = mock_account(&db, now).await?;
        let user = mock_user(&db, now).await?;
        mock_membership(&db, &user, &account, &["admin"], now).await?;
        mock_membership(&db, &user, &keep, &["admin"], now).await?;
        for name in PreferenceName::ALL {
            mock_preference(&db, &account, name, now).await?;
        }
        mock_preference(&db, &keep, PreferenceName::TimeFormat, now).await?;

        // archived first: delete still removes every dependent row
        db.accounts().archive(&ctx, &internal, &account.id, now).await?;
        db.accounts().delete(&ctx, &internal, &account.id).await?;

        for table in ["users_accounts", "account_preferences", "accounts"] {
            assert_eq!(count(&db, table, &account.id).await?, 0, "{} still has rows", table);
        }
        assert_eq!(count(&db, "users_accounts", &keep.id).await?, 1);
        assert_eq!(count(&db, "account_preferences", &keep.id).await?, 1);
        db.users().read(&ctx, &internal, &user.id, false).await?;

        let err = db.accounts().delete(&ctx, &internal, &account.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        Ok(())
    })
}

#[tokio::test]
async fn failed_delete_changes_nothing() -> Result<()> {
    with_db!("failed_delete_changes_nothing", |db| {
        let now = common::t0();
        let account = mock_account(&db, now).await?;
        let user = mock_user(&db, now).await?;
        mock_membership(&db, &user, &account, &["user"], now).await?;
        mock_preference(&db, &account, PreferenceName::DateFormat, now).await?;

        let err = db
            .accounts()
            .delete(&Context::new(), &mock_claims::member(&account.id, &user.id), &account.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let cancelled = Context::new();
        cancelled.cancel();
        let err = db.accounts().delete(&cancelled, &mock_claims::internal(), &account.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        for table in ["users_accounts", "account_preferences", "accounts"] {
            assert_eq!(count(&db, table, &account.id).await?, 1, "{} changed", table);
        }
        Ok(())
    })
}

#[tokio::test]
async fn user_delete_removes_memberships_first() -> Result<()> {
    with_db!("user_delete_removes_memberships_first", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();
        let account = mock_account(&db, now).await?;
        let user = mock_user(&db, now).await?;
        mock_membership(&db, &user, &account, &["admin"], now).await?;

        db.users().delete(&ctx, &internal, &user.id).await?;
        assert_eq!(count(&db, "users_accounts", &account.id).await?, 0);
        let err = db.users().read(&ctx, &internal, &user.id, true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        Ok(())
    })
}
