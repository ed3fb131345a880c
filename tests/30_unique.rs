mod common;

use anyhow::Result;
use saas_adal::database::models::{AccountUpdateRequest, UserAccountCreateRequest, UserUpdateRequest};
use saas_adal::testing::{account_request, mock_account, mock_claims, mock_membership, mock_user, user_request};
use saas_adal::{Context, ErrorKind};

#[tokio::test]
async fn account_name_unique_among_live_rows() -> Result<()> {
    with_db!("account_name_unique_among_live_rows", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();

        let first = db.accounts().create(&ctx, &internal, &account_request("Acme"), now).await?;
        let err = db.accounts().create(&ctx, &internal, &account_request("Acme"), now).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.validation_errors().unwrap().has("name", "unique"));

        // case-sensitive
        db.accounts().create(&ctx, &internal, &account_request("ACME"), now).await?;

        // archived rows release their name
        db.accounts().archive(&ctx, &internal, &first.id, now).await?;
        let second = db.accounts().create(&ctx, &internal, &account_request("Acme"), now).await?;
        assert_ne!(second.id, first.id);
        Ok(())
    })
}

#[tokio::test]
async fn update_uniqueness_check_excludes_own_row() -> Result<()> {
    with_db!("update_uniqueness_check_excludes_own_row", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();
        let acme = db.accounts().create(&ctx, &internal, &account_request("Acme"), now).await?;
        db.accounts().create(&ctx, &internal, &account_request("Globex"), now).await?;

        let mut req = AccountUpdateRequest::new(acme.id.as_str());
        req.name = Some("Acme".into());
        db.accounts().update(&ctx, &internal, &req, now).await?;

        req.name = Some("Globex".into());
        let err = db.accounts().update(&ctx, &internal, &req, now).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has("name", "unique"));
        Ok(())
    })
}

#[tokio::test]
async fn user_email_unique_among_live_rows() -> Result<()> {
    with_db!("user_email_unique_among_live_rows", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();

        let first = db.users().create(&ctx, &internal, &user_request("a@x"), now).await?;
        let err = db.users().create(&ctx, &internal, &user_request("a@x"), now).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has("email", "unique"));

        let other = db.users().create(&ctx, &internal, &user_request("b@x"), now).await?;
        let mut req = UserUpdateRequest::new(other.id.as_str());
        req.email = Some("a@x".into());
        let err = db.users().update(&ctx, &internal, &req, now).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has("email", "unique"));

        db.users().archive(&ctx, &internal, &first.id, now).await?;
        db.users().update(&ctx, &internal, &req, now).await?;
        assert_eq!(db.users().read(&ctx, &internal, &other.id, false).await?.email, "a@x");
        Ok(())
    })
}

#[tokio::test]
async fn concurrent_creates_admit_one_winner() -> Result<()> {
    with_db!("concurrent_creates_admit_one_winner", |db| {
        let internal = mock_claims::internal();
        let now = common::t0();
        let accounts = db.accounts();
        let (ctx_a, ctx_b) = (Context::new(), Context::new());
        let req = account_request("Racy");

        let (a, b) = tokio::join!(
            accounts.create(&ctx_a, &internal, &req, now),
            accounts.create(&ctx_b, &internal, &req, now),
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        for err in outcomes.iter().filter_map(|r| r.as_ref().err()) {
            match err.kind() {
                ErrorKind::Conflict => {}
                ErrorKind::BadRequest => assert!(err.validation_errors().unwrap().has("name", "unique")),
                other => panic!("unexpected outcome {:?}: {}", other, err),
            }
        }
        Ok(())
    })
}

#[tokio::test]
async fn membership_pair_restores_archived_row() -> Result<()> {
    with_db!("membership_pair_restores_archived_row", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();
        let later = now + chrono::Duration::hours(1);
        let account = mock_account(&db, now).await?;
        let user = mock_user(&db, now).await?;
        let membership = mock_membership(&db, &user, &account, &["user"], now).await?;

        let req = UserAccountCreateRequest {
            user_id: user.id.clone(),
            account_id: account.id.clone(),
            roles: vec!["admin".into()],
            status: None,
        };
        let err = db.memberships().create(&ctx, &internal, &req, now).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has("account_id", "unique"));

        db.memberships().archive(&ctx, &internal, &membership.id, now).await?;
        let restored = db.memberships().create(&ctx, &internal, &req, later).await?;
        assert_eq!(restored.id, membership.id);
        assert!(restored.roles.is_admin());
        assert!(restored.archived_at.is_none());

        let read = db.memberships().read_by_pair(&ctx, &internal, &user.id, &account.id).await?;
        assert_eq!(read.id, membership.id);
        assert_eq!(read.updated_at, later);
        Ok(())
    })
}
