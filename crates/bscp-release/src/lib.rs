//! BSCP Release - Commit, release and strategy services
//!
//! This crate provides:
//! - The typed strategy predicate and its label matching
//! - Commit and multi commit workflows
//! - Release and multi release workflows, including atomic publishing
//! - Strategy and config item stores
//! - The publish manager that fans signalling out to matching sessions

pub mod model;
pub mod service;

// Re-export commonly used types
pub use model::{Clause, LabelMatcher, Predicate};
pub use service::{
    StoreContext,
    blob::{BlobStore, UncheckedBlobStore},
    commit::CommitStore,
    config_item::ConfigItemStore,
    multi_commit::MultiCommitStore,
    multi_release::MultiReleaseStore,
    publish::PublishManager,
    release::ReleaseStore,
    strategy::StrategyStore,
};
