//! BSCP Persistence - Database entities and shard routing
//!
//! This crate provides:
//! - SeaORM entity definitions for commits, releases, strategies and config items
//! - Schema migrations applied to every shard
//! - The `ShardingRouter` that pins each business to one database
//! - Storage error mapping and per-call timeouts

pub mod db;
pub mod entity;
pub mod migration;
pub mod model;
pub mod sharding;

// Re-export sea-orm for convenience
pub use sea_orm;

// Re-export entity prelude
pub use entity::prelude::*;

pub use db::{storage_error, timed};
pub use migration::Migrator;
pub use model::{
    CommitState, ConfigItemState, MultiCommitState, MultiReleaseState, Page, ReleaseState,
};
pub use sharding::{ShardHealth, ShardingRouter, shard_for};
