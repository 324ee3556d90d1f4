//! Commit, release and strategy store tests against in-memory SQLite shards.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use bscp_api::CommitSpec;
use bscp_common::ErrorKind;
use bscp_persistence::{
    entity::{config_items, releases},
    sea_orm::{EntityTrait, sea_query::Expr},
};
use serde_json::json;

use common::{APP, BIZ, EmptyBlobStore, OPERATOR, Stores, content_spec};

fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_commit_moves_forward_only() {
    let stores = Stores::new().await;
    let cfg_id = stores.config_item("app.yaml").await;

    let canceled = stores
        .commits
        .create(BIZ, APP, &content_spec(cfg_id), OPERATOR)
        .await
        .unwrap();
    assert_eq!(stores.commits.query(BIZ, canceled).await.unwrap().state, "Init");

    stores.commits.cancel(BIZ, canceled, OPERATOR).await.unwrap();
    // Canceling twice is idempotent.
    stores.commits.cancel(BIZ, canceled, OPERATOR).await.unwrap();
    let err = stores.commits.confirm(BIZ, canceled, OPERATOR).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
    assert_eq!(
        stores.commits.query(BIZ, canceled).await.unwrap().state,
        "Canceled"
    );

    let confirmed = stores
        .commits
        .create(BIZ, APP, &content_spec(cfg_id), OPERATOR)
        .await
        .unwrap();
    stores.commits.confirm(BIZ, confirmed, OPERATOR).await.unwrap();
    stores.commits.confirm(BIZ, confirmed, OPERATOR).await.unwrap();
    let err = stores.commits.cancel(BIZ, confirmed, OPERATOR).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
    assert_eq!(
        stores.commits.query(BIZ, confirmed).await.unwrap().state,
        "Confirmed"
    );
}

#[tokio::test]
async fn test_commit_requires_existing_config_item() {
    let stores = Stores::new().await;

    let err = stores
        .commits
        .create(BIZ, APP, &content_spec(4242), OPERATOR)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_confirm_rejects_missing_blob() {
    let stores = Stores::with_blobs(Arc::new(EmptyBlobStore)).await;
    let cfg_id = stores.config_item("app.yaml").await;
    let commit_id = stores
        .commits
        .create(BIZ, APP, &content_spec(cfg_id), OPERATOR)
        .await
        .unwrap();

    let err = stores.commits.confirm(BIZ, commit_id, OPERATOR).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(stores.commits.query(BIZ, commit_id).await.unwrap().state, "Init");
}

#[tokio::test]
async fn test_release_requires_confirmed_commit() {
    let stores = Stores::new().await;
    let cfg_id = stores.config_item("app.yaml").await;
    let commit_id = stores
        .commits
        .create(BIZ, APP, &content_spec(cfg_id), OPERATOR)
        .await
        .unwrap();

    let err = stores
        .releases
        .create(BIZ, APP, commit_id, 0, "v1", "", OPERATOR)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
}

#[tokio::test]
async fn test_publish_updates_release_commit_and_config_item() {
    let stores = Stores::new().await;
    let (cfg_id, commit_id) = stores.confirmed_commit("app.yaml").await;

    let release_id = stores
        .releases
        .create(BIZ, APP, commit_id, 0, "v1", "first", OPERATOR)
        .await
        .unwrap();
    let created = stores.releases.query(BIZ, release_id).await.unwrap();
    assert_eq!(created.state, "Init");
    assert_eq!(created.cfg_id, cfg_id);
    assert_eq!(created.strategies, "{}");

    let published = stores.releases.publish(BIZ, release_id, OPERATOR).await.unwrap();
    assert_eq!(published.state, "Published");

    let commit = stores.commits.query(BIZ, commit_id).await.unwrap();
    assert_eq!(commit.release_id, release_id);
    let item = stores.config_items.query(BIZ, cfg_id).await.unwrap();
    assert_eq!(item.state, "Released");

    // Publishing again is idempotent.
    stores.releases.publish(BIZ, release_id, OPERATOR).await.unwrap();
}

#[tokio::test]
async fn test_publish_is_all_or_nothing() {
    let stores = Stores::new().await;
    let (cfg_id, commit_id) = stores.confirmed_commit("app.yaml").await;
    let release_id = stores
        .releases
        .create(BIZ, APP, commit_id, 0, "v1", "", OPERATOR)
        .await
        .unwrap();

    // Remove the config item so the last publishing step fails.
    let db = stores.router.shard(BIZ).unwrap();
    config_items::Entity::delete_by_id(cfg_id).exec(db).await.unwrap();

    let err = stores.releases.publish(BIZ, release_id, OPERATOR).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(stores.releases.query(BIZ, release_id).await.unwrap().state, "Init");
    assert_eq!(stores.commits.query(BIZ, commit_id).await.unwrap().release_id, 0);
}

#[tokio::test]
async fn test_canceled_release_cannot_publish() {
    let stores = Stores::new().await;
    let (_, commit_id) = stores.confirmed_commit("app.yaml").await;
    let release_id = stores
        .releases
        .create(BIZ, APP, commit_id, 0, "v1", "", OPERATOR)
        .await
        .unwrap();

    stores.releases.cancel(BIZ, release_id, OPERATOR).await.unwrap();
    stores.releases.cancel(BIZ, release_id, OPERATOR).await.unwrap();

    let err = stores.releases.publish(BIZ, release_id, OPERATOR).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
}

#[tokio::test]
async fn test_rollback_and_reload_need_published_release() {
    let stores = Stores::new().await;
    let (_, commit_id) = stores.confirmed_commit("app.yaml").await;
    let release_id = stores
        .releases
        .create(BIZ, APP, commit_id, 0, "v1", "", OPERATOR)
        .await
        .unwrap();

    let err = stores.releases.rollback(BIZ, release_id, OPERATOR).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
    let err = stores.releases.reload_target(BIZ, release_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);

    stores.releases.publish(BIZ, release_id, OPERATOR).await.unwrap();
    assert_eq!(
        stores.releases.reload_target(BIZ, release_id).await.unwrap().id,
        release_id
    );

    let rolled = stores.releases.rollback(BIZ, release_id, OPERATOR).await.unwrap();
    assert_eq!(rolled.state, "Rollbacked");
    let err = stores.releases.reload_target(BIZ, release_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
}

#[tokio::test]
async fn test_newest_releases_ordered_by_id() {
    let stores = Stores::new().await;
    let (cfg_id, commit_id) = stores.confirmed_commit("app.yaml").await;

    let mut published = Vec::new();
    for name in ["v1", "v2", "v3"] {
        let id = stores
            .releases
            .create(BIZ, APP, commit_id, 0, name, "", OPERATOR)
            .await
            .unwrap();
        stores.releases.publish(BIZ, id, OPERATOR).await.unwrap();
        published.push(id);
    }
    // Never published: excluded.
    stores
        .releases
        .create(BIZ, APP, commit_id, 0, "draft", "", OPERATOR)
        .await
        .unwrap();

    // Identical timestamps leave the id as the only ordering key.
    let same = chrono::DateTime::from_timestamp(1_700_000_000, 0)
        .unwrap()
        .naive_utc();
    releases::Entity::update_many()
        .col_expr(releases::Column::CreatedAt, Expr::value(same))
        .col_expr(releases::Column::UpdatedAt, Expr::value(same))
        .exec(stores.router.shard(BIZ).unwrap())
        .await
        .unwrap();

    let page = stores
        .releases
        .query_newest(BIZ, cfg_id, 1, 2)
        .await
        .unwrap();
    assert_eq!(page.total_count, 3);
    let ids: Vec<i64> = page.page_items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![published[2], published[1]]);

    let page = stores
        .releases
        .query_newest(BIZ, cfg_id, 2, 2)
        .await
        .unwrap();
    let ids: Vec<i64> = page.page_items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![published[0]]);
}

#[tokio::test]
async fn test_strategy_creation_validates_clauses() {
    let stores = Stores::new().await;

    let err = stores
        .strategies
        .create(BIZ, APP, "bad", &json!({"labelsOr": [{"zone": 1}]}), "", OPERATOR)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = stores
        .strategies
        .create(BIZ, APP, "bad", &json!({"labelsOr": ["zone"]}), "", OPERATOR)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let id = stores
        .strategies
        .create(BIZ, APP, "gz", &json!({"labelsOr": [{"zone": "gz"}]}), "", OPERATOR)
        .await
        .unwrap();
    let info = stores.strategies.query(BIZ, id).await.unwrap();
    assert_eq!(info.content, json!({"labelsOr": [{"zone": "gz"}]}));

    let empty = stores
        .strategies
        .create(BIZ, APP, "all", &json!(""), "", OPERATOR)
        .await
        .unwrap();
    assert_eq!(stores.strategies.query(BIZ, empty).await.unwrap().content, json!({}));
}

#[tokio::test]
async fn test_newest_matching_follows_strategy() {
    let stores = Stores::new().await;
    let (cfg_id, commit_id) = stores.confirmed_commit("app.yaml").await;
    let gz = stores
        .strategies
        .create(BIZ, APP, "gz", &json!({"labelsOr": [{"zone": "gz"}]}), "", OPERATOR)
        .await
        .unwrap();

    let everyone = stores
        .releases
        .create(BIZ, APP, commit_id, 0, "all", "", OPERATOR)
        .await
        .unwrap();
    stores.releases.publish(BIZ, everyone, OPERATOR).await.unwrap();
    let gz_only = stores
        .releases
        .create(BIZ, APP, commit_id, gz, "gz", "", OPERATOR)
        .await
        .unwrap();
    stores.releases.publish(BIZ, gz_only, OPERATOR).await.unwrap();

    let (release, content) = stores
        .releases
        .newest_matching(BIZ, APP, cfg_id, &labels(&[("zone", "gz")]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(release.id, gz_only);
    assert_eq!(content.unwrap().content_size, 42);

    let (release, _) = stores
        .releases
        .newest_matching(BIZ, APP, cfg_id, &labels(&[("zone", "sh")]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(release.id, everyone);

    let none = stores
        .releases
        .newest_matching(BIZ, APP, cfg_id + 1000, &labels(&[]))
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_multi_commit_records_partial_results() {
    let stores = Stores::new().await;
    let good = stores.config_item("good.yaml").await;

    let two_sources = CommitSpec {
        cfgset_id: good,
        template: Some("{{ .x }}".to_string()),
        template_id: Some(3),
        ..Default::default()
    };
    let items = vec![content_spec(good), content_spec(999_999), two_sources];

    let (multi_commit_id, results) = stores
        .multi_commits
        .create(BIZ, APP, 0, "batch", &items, OPERATOR)
        .await
        .unwrap();

    assert!(multi_commit_id > 0);
    assert_eq!(
        results.iter().map(|r| r.success).collect::<Vec<_>>(),
        vec![true, false, false]
    );
    assert_eq!(results[1].cfgset_id, 999_999);
    assert!(results[0].id > 0);

    let info = stores.multi_commits.query(BIZ, multi_commit_id).await.unwrap();
    assert_eq!(info.state, "Init");
    assert_eq!(info.commits.len(), 1);
    assert_eq!(info.commits[0].multi_commit_id, multi_commit_id);
}

#[tokio::test]
async fn test_multi_commit_reuse_rules() {
    let stores = Stores::new().await;
    let cfg = stores.config_item("a.yaml").await;

    let err = stores
        .multi_commits
        .create(BIZ, APP, 12345, "", &[content_spec(cfg)], OPERATOR)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let (id, _) = stores
        .multi_commits
        .create(BIZ, APP, 0, "", &[content_spec(cfg)], OPERATOR)
        .await
        .unwrap();
    let (reused, results) = stores
        .multi_commits
        .create(BIZ, APP, id, "", &[content_spec(cfg)], OPERATOR)
        .await
        .unwrap();
    assert_eq!(reused, id);
    assert!(results[0].success);
    assert_eq!(stores.multi_commits.query(BIZ, id).await.unwrap().commits.len(), 2);

    stores.multi_commits.cancel(BIZ, id, OPERATOR).await.unwrap();
    let err = stores
        .multi_commits
        .create(BIZ, APP, id, "", &[content_spec(cfg)], OPERATOR)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
}

#[tokio::test]
async fn test_cancel_multi_commit_with_mixed_children() {
    let stores = Stores::new().await;
    let a = stores.config_item("a.yaml").await;
    let b = stores.config_item("b.yaml").await;

    let (id, results) = stores
        .multi_commits
        .create(BIZ, APP, 0, "", &[content_spec(a), content_spec(b)], OPERATOR)
        .await
        .unwrap();
    let confirmed_child = results[0].id;
    stores
        .commits
        .confirm(BIZ, confirmed_child, OPERATOR)
        .await
        .unwrap();

    let outcome = stores.multi_commits.cancel(BIZ, id, OPERATOR).await.unwrap();
    assert_eq!(
        outcome.iter().map(|r| r.success).collect::<Vec<_>>(),
        vec![false, true]
    );

    let info = stores.multi_commits.query(BIZ, id).await.unwrap();
    assert_eq!(info.state, "Canceled");
    let states: Vec<&str> = info.commits.iter().map(|c| c.state.as_str()).collect();
    assert_eq!(states, vec!["Confirmed", "Canceled"]);

    // A second cancel revisits the children without failing the call.
    let again = stores.multi_commits.cancel(BIZ, id, OPERATOR).await.unwrap();
    assert_eq!(again.len(), 2);
    assert!(again[1].success);
}

#[tokio::test]
async fn test_multi_release_lifecycle() {
    let stores = Stores::new().await;
    let a = stores.config_item("a.yaml").await;
    let b = stores.config_item("b.yaml").await;

    let (multi_commit_id, _) = stores
        .multi_commits
        .create(BIZ, APP, 0, "", &[content_spec(a), content_spec(b)], OPERATOR)
        .await
        .unwrap();

    let err = stores
        .multi_releases
        .create(BIZ, APP, multi_commit_id, 0, "r", "", OPERATOR)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);

    let confirmed = stores
        .multi_commits
        .confirm(BIZ, multi_commit_id, OPERATOR)
        .await
        .unwrap();
    assert!(confirmed.iter().all(|r| r.success));

    let (multi_release_id, results) = stores
        .multi_releases
        .create(BIZ, APP, multi_commit_id, 0, "r", "", OPERATOR)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(
        stores
            .multi_commits
            .query(BIZ, multi_commit_id)
            .await
            .unwrap()
            .multi_release_id,
        multi_release_id
    );

    let published = stores
        .multi_releases
        .publish(BIZ, multi_release_id, OPERATOR)
        .await
        .unwrap();
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|r| r.state == "Published"));

    let info = stores.multi_releases.query(BIZ, multi_release_id).await.unwrap();
    assert_eq!(info.state, "Published");
    assert_eq!(stores.config_items.query(BIZ, a).await.unwrap().state, "Released");

    let err = stores
        .multi_releases
        .cancel(BIZ, multi_release_id, OPERATOR)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
}

#[tokio::test]
async fn test_cancel_multi_release_cancels_members() {
    let stores = Stores::new().await;
    let a = stores.config_item("a.yaml").await;
    let (multi_commit_id, _) = stores
        .multi_commits
        .create(BIZ, APP, 0, "", &[content_spec(a)], OPERATOR)
        .await
        .unwrap();
    stores
        .multi_commits
        .confirm(BIZ, multi_commit_id, OPERATOR)
        .await
        .unwrap();
    let (multi_release_id, _) = stores
        .multi_releases
        .create(BIZ, APP, multi_commit_id, 0, "r", "", OPERATOR)
        .await
        .unwrap();

    stores
        .multi_releases
        .cancel(BIZ, multi_release_id, OPERATOR)
        .await
        .unwrap();

    let info = stores.multi_releases.query(BIZ, multi_release_id).await.unwrap();
    assert_eq!(info.state, "Canceled");
    assert!(info.releases.iter().all(|r| r.state == "Canceled"));
}
