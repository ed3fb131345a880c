mod common;

use anyhow::Result;
use chrono::Duration;
use saas_adal::database::query_builder::SqlValue;
use saas_adal::filter::FindFilter;
use saas_adal::testing::{account_request, mock_claims};
use saas_adal::{Context, ErrorKind};

// Find over a fresh database holding exactly the accounts each test creates.

#[tokio::test]
async fn order_limit_offset_window() -> Result<()> {
    with_db!("order_limit_offset_window", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let mut ids = Vec::new();
        for i in 0..5 {
            let at = common::t0() + Duration::seconds(i);
            let account = db.accounts().create(&ctx, &internal, &account_request(&format!("Acct {}", i)), at).await?;
            ids.push(account.id);
        }

        let filter = FindFilter::new().order(["created_at desc"]).limit(2).offset(1);
        let found = db.accounts().find(&ctx, &internal, &filter).await?;
        let got: Vec<_> = found.iter().map(|a| a.id.clone()).collect();
        assert_eq!(got, vec![ids[3].clone(), ids[2].clone()]);

        // offset without limit
        let filter = FindFilter::new().order(["created_at"]).offset(3);
        let found = db.accounts().find(&ctx, &internal, &filter).await?;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, ids[3]);
        Ok(())
    })
}

#[tokio::test]
async fn where_text_binds_arguments() -> Result<()> {
    with_db!("where_text_binds_arguments", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();
        for name in ["Alpha", "Beta", "Gamma"] {
            db.accounts().create(&ctx, &internal, &account_request(name), now).await?;
        }

        let filter = FindFilter::new()
            .where_clause("name = ? OR name = ?", vec!["Alpha".into(), "Gamma".into()])
            .order(["name desc"]);
        let names: Vec<_> = db
            .accounts()
            .find(&ctx, &internal, &filter)
            .await?
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Gamma", "Alpha"]);

        // arguments are data, never SQL
        let filter = FindFilter::new().where_clause("name = ?", vec!["x' OR '1'='1".into()]);
        assert!(db.accounts().find(&ctx, &internal, &filter).await?.is_empty());

        let filter = FindFilter::new().where_clause("created_at >= ?", vec![SqlValue::from(now)]);
        assert_eq!(db.accounts().find(&ctx, &internal, &filter).await?.len(), 3);
        Ok(())
    })
}

#[tokio::test]
async fn malformed_filters_are_bad_requests() -> Result<()> {
    with_db!("malformed_filters_are_bad_requests", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let cases = [
            FindFilter::new().order(["created_at sideways"]),
            FindFilter::new().order(["password_hash"]),
            FindFilter::new().where_clause("password_hash = ?", vec!["x".into()]),
            FindFilter::new().where_clause("name = ? AND city = ?", vec!["x".into()]),
            FindFilter::new().offset(-1),
        ];
        for filter in cases {
            let err = db.accounts().find(&ctx, &internal, &filter).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest, "{:?}", filter);
        }
        Ok(())
    })
}

#[tokio::test]
async fn limit_is_clamped_to_configured_max() -> Result<()> {
    with_db!("limit_is_clamped_to_configured_max", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        for i in 0..3 {
            db.accounts().create(&ctx, &internal, &account_request(&format!("Clamp {}", i)), common::t0()).await?;
        }
        let found = db.accounts().find(&ctx, &internal, &FindFilter::new().limit(0)).await?;
        assert_eq!(found.len(), 1);
        let found = db.accounts().find(&ctx, &internal, &FindFilter::new().limit(i64::MAX)).await?;
        assert_eq!(found.len(), 3);
        Ok(())
    })
}

#[tokio::test]
async fn include_archived_widens_results() -> Result<()> {
    with_db!("include_archived_widens_results", |db| {
        let ctx = Context::new();
        let internal = mock_claims::internal();
        let now = common::t0();
        let gone = db.accounts().create(&ctx, &internal, &account_request("Gone"), now).await?;
        db.accounts().create(&ctx, &internal, &account_request("Here"), now).await?;
        db.accounts().archive(&ctx, &internal, &gone.id, now).await?;

        assert_eq!(db.accounts().find(&ctx, &internal, &FindFilter::new()).await?.len(), 1);
        let all = db.accounts().find(&ctx, &internal, &FindFilter::new().include_archived(true)).await?;
        assert_eq!(all.len(), 2);

        let cancelled = Context::new();
        cancelled.cancel();
        let err = db.accounts().find(&cancelled, &internal, &FindFilter::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        Ok(())
    })
}
