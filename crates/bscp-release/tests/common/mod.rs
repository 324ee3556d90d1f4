//! Shared fixtures for store tests: in-memory SQLite shards and one wired
//! set of stores.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bscp_api::{CommitSpec, ContentRef};
use bscp_common::BscpResult;
use bscp_persistence::{ShardingRouter, sea_orm::ConnectOptions};
use bscp_release::{
    BlobStore, CommitStore, ConfigItemStore, MultiCommitStore, MultiReleaseStore, ReleaseStore,
    StoreContext, StrategyStore, UncheckedBlobStore,
};

pub const BIZ: i64 = 7;
pub const APP: i64 = 70;
pub const OPERATOR: &str = "tester";

pub async fn memory_router(shards: usize) -> Arc<ShardingRouter> {
    let options = (0..shards)
        .map(|_| {
            let mut opt = ConnectOptions::new("sqlite::memory:");
            opt.max_connections(1).min_connections(1).sqlx_logging(false);
            opt
        })
        .collect();

    let router = ShardingRouter::connect(options).await.unwrap();
    router.migrate_all().await.unwrap();
    Arc::new(router)
}

/// Blob store that knows no blobs at all.
pub struct EmptyBlobStore;

#[async_trait]
impl BlobStore for EmptyBlobStore {
    async fn exists(&self, _biz_id: i64, _content: &ContentRef) -> BscpResult<bool> {
        Ok(false)
    }
}

pub struct Stores {
    pub router: Arc<ShardingRouter>,
    pub config_items: ConfigItemStore,
    pub strategies: StrategyStore,
    pub commits: CommitStore,
    pub multi_commits: MultiCommitStore,
    pub releases: ReleaseStore,
    pub multi_releases: MultiReleaseStore,
}

impl Stores {
    pub async fn new() -> Self {
        Self::with_blobs(Arc::new(UncheckedBlobStore)).await
    }

    pub async fn with_blobs(blobs: Arc<dyn BlobStore>) -> Self {
        let router = memory_router(2).await;
        let ctx = StoreContext::new(router.clone(), Duration::from_secs(5));
        let commits = CommitStore::new(ctx.clone(), blobs);
        Self {
            router,
            config_items: ConfigItemStore::new(ctx.clone()),
            strategies: StrategyStore::new(ctx.clone()),
            multi_commits: MultiCommitStore::new(ctx.clone(), commits.clone()),
            commits,
            releases: ReleaseStore::new(ctx.clone()),
            multi_releases: MultiReleaseStore::new(ctx),
        }
    }

    pub async fn config_item(&self, name: &str) -> i64 {
        self.config_items
            .create(BIZ, APP, name, "/etc/app", "yaml", "", OPERATOR)
            .await
            .unwrap()
    }

    /// A confirmed commit on a fresh config item.
    pub async fn confirmed_commit(&self, name: &str) -> (i64, i64) {
        let cfg_id = self.config_item(name).await;
        let commit_id = self
            .commits
            .create(BIZ, APP, &content_spec(cfg_id), OPERATOR)
            .await
            .unwrap();
        self.commits.confirm(BIZ, commit_id, OPERATOR).await.unwrap();
        (cfg_id, commit_id)
    }
}

pub fn content_spec(cfgset_id: i64) -> CommitSpec {
    CommitSpec {
        cfgset_id,
        content: Some(ContentRef {
            content_id: "ab".repeat(32),
            content_size: 42,
        }),
        ..Default::default()
    }
}
