//! Release pipeline services
//!
//! Every store resolves the owning shard of a business through the
//! [`ShardingRouter`] and runs each database round-trip under the configured
//! timeout. Multi-step writes run inside one transaction on that shard.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDateTime;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::warn;

use bscp_common::BscpResult;
use bscp_persistence::{ShardingRouter, storage_error};

pub mod blob;
pub mod commit;
pub mod config_item;
pub mod multi_commit;
pub mod multi_release;
pub mod publish;
pub mod release;
pub mod strategy;

/// Shard routing and timeout settings shared by all stores.
#[derive(Clone)]
pub struct StoreContext {
    router: Arc<ShardingRouter>,
    timeout: Duration,
}

impl StoreContext {
    pub fn new(router: Arc<ShardingRouter>, timeout: Duration) -> Self {
        Self { router, timeout }
    }

    pub fn router(&self) -> &ShardingRouter {
        &self.router
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn db(&self, biz_id: i64) -> BscpResult<&DatabaseConnection> {
        self.router.shard(biz_id)
    }
}

pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub(crate) fn millis(at: NaiveDateTime) -> i64 {
    at.and_utc().timestamp_millis()
}

/// Commit `txn` when `result` is Ok, roll it back otherwise.
pub(crate) async fn finish<T>(txn: DatabaseTransaction, result: BscpResult<T>) -> BscpResult<T> {
    match result {
        Ok(value) => {
            txn.commit().await.map_err(storage_error)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "Transaction rollback failed");
            }
            Err(e)
        }
    }
}

/// Open a transaction on `db`.
pub(crate) async fn begin(db: &DatabaseConnection) -> BscpResult<DatabaseTransaction> {
    db.begin().await.map_err(storage_error)
}
