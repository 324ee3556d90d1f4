//! SeaORM entity definitions, one table per pipeline record.

pub mod prelude;

pub mod commits;
pub mod config_items;
pub mod multi_commits;
pub mod multi_releases;
pub mod releases;
pub mod strategies;
