mod common;

use anyhow::Result;
use saas_adal::database::models::{AccountPreferenceSetRequest, AccountUpdateRequest, PreferenceName};
use saas_adal::filter::FindFilter;
use saas_adal::testing::{mock_account, mock_claims, mock_membership, mock_user};
use saas_adal::{Context, ErrorKind};

fn cancelled() -> Context {
    let ctx = Context::new();
    ctx.cancel();
    ctx
}

#[tokio::test]
async fn cancelled_context_stops_every_operation() -> Result<()> {
    with_db!("cancelled_context_stops_every_operation", |db| {
        let internal = mock_claims::internal();
        let now = common::t0();
        let account = mock_account(&db, now).await?;
        let user = mock_user(&db, now).await?;
        let membership = mock_membership(&db, &user, &account, &["admin"], now).await?;
        let ctx = cancelled();

        let err = db.accounts().find(&ctx, &internal, &FindFilter::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        let err = db.users().read(&ctx, &internal, &user.id, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let mut req = AccountUpdateRequest::new(account.id.as_str());
        req.city = Some("Kodiak".into());
        let err = db.accounts().update(&ctx, &internal, &req, now).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        let err = db.accounts().archive(&ctx, &internal, &account.id, now).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        let err = db.memberships().archive(&ctx, &internal, &membership.id, now).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let pref = AccountPreferenceSetRequest::new(account.id.as_str(), PreferenceName::DateFormat, "2006-01-02");
        let err = db.preferences().set(&ctx, &internal, &pref, now).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        // nothing changed
        let fresh = Context::new();
        let stored = db.accounts().read(&fresh, &internal, &account.id, false).await?;
        assert_eq!(stored, account);
        db.memberships().read(&fresh, &internal, &membership.id, false).await?;
        assert!(db.preferences().find_by_account_id(&fresh, &internal, &account.id).await?.is_empty());
        Ok(())
    })
}

#[tokio::test]
async fn cancelling_a_parent_cancels_children() -> Result<()> {
    with_db!("cancelling_a_parent_cancels_children", |db| {
        let parent = Context::new();
        let child = parent.child();
        db.accounts().find(&child, &mock_claims::internal(), &FindFilter::new()).await?;

        parent.cancel();
        let err = db
            .accounts()
            .find(&child, &mock_claims::internal(), &FindFilter::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        Ok(())
    })
}
