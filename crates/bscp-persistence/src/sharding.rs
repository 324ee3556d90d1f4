//! Tenant-sharded database routing.
//!
//! Every business id is pinned to one shard by a stable hash over the fixed
//! pool opened at start-up. The pool never changes while the process runs.

use md5::{Digest, Md5};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::{info, warn};

use bscp_common::{BscpError, BscpResult};

use crate::migration::Migrator;

/// Shard index for a business id: md5 of its decimal form, first eight bytes
/// read big-endian, modulo the shard count.
pub fn shard_for(biz_id: i64, shard_count: usize) -> usize {
    let digest = Md5::digest(biz_id.to_string().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % shard_count as u64) as usize
}

/// Health of one shard as reported by [`ShardingRouter::ping_all`].
#[derive(Debug, Clone)]
pub struct ShardHealth {
    pub index: usize,
    pub healthy: bool,
    pub error: Option<String>,
}

pub struct ShardingRouter {
    shards: Vec<DatabaseConnection>,
}

impl ShardingRouter {
    pub fn new(shards: Vec<DatabaseConnection>) -> Self {
        Self { shards }
    }

    /// Open one pool per shard, in order. Shard order is part of the routing
    /// contract: reordering the list remaps tenants.
    pub async fn connect(options: Vec<ConnectOptions>) -> Result<Self, DbErr> {
        let mut shards = Vec::with_capacity(options.len());
        for (index, opt) in options.into_iter().enumerate() {
            let db = Database::connect(opt).await?;
            info!(shard = index, "Connected database shard");
            shards.push(db);
        }
        Ok(Self::new(shards))
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shards(&self) -> &[DatabaseConnection] {
        &self.shards
    }

    pub fn shard_index(&self, biz_id: i64) -> BscpResult<usize> {
        if self.shards.is_empty() {
            return Err(BscpError::ShardUnavailable(
                "no database shard configured".to_string(),
            ));
        }
        Ok(shard_for(biz_id, self.shards.len()))
    }

    /// Connection pool owning `biz_id`'s rows.
    pub fn shard(&self, biz_id: i64) -> BscpResult<&DatabaseConnection> {
        let index = self.shard_index(biz_id)?;
        Ok(&self.shards[index])
    }

    /// Apply pending schema migrations on every shard.
    pub async fn migrate_all(&self) -> Result<(), DbErr> {
        for (index, db) in self.shards.iter().enumerate() {
            Migrator::up(db, None).await?;
            info!(shard = index, "Schema migrations applied");
        }
        Ok(())
    }

    pub async fn ping_all(&self) -> Vec<ShardHealth> {
        let pings = self.shards.iter().map(|db| db.ping());
        futures::future::join_all(pings)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(()) => ShardHealth {
                    index,
                    healthy: true,
                    error: None,
                },
                Err(e) => {
                    warn!(shard = index, error = %e, "Database shard ping failed");
                    ShardHealth {
                        index,
                        healthy: false,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect()
    }
}
