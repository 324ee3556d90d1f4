//! Commit, release, strategy and config item RPC models.

pub mod model;

pub use model::*;
