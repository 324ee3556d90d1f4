//! BSCP Common - Shared types and utilities
//!
//! This crate provides the foundational types used across all BSCP components:
//! - Error taxonomy and error codes
//! - Utility functions
//! - Common constants

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, BscpError, ErrorCode, ErrorKind};
pub use utils::{is_sha256, is_valid_name, local_ip};

/// Result alias used by every store and service.
pub type BscpResult<T> = Result<T, BscpError>;

/// Stored form of the strategy that matches every instance.
pub const EMPTY_STRATEGY: &str = "{}";

/// Label keys that scope a strategy to a namespace or cluster.
pub const NAMESPACE_LABEL: &str = "namespace";
pub const CLUSTER_LABEL: &str = "cluster";

/// Maximum length of a memo attached to commits and releases.
pub const MAX_MEMO_LEN: usize = 256;

/// Upper bound on the pause between signalling pushes, in milliseconds.
pub const MAX_NICENESS_MS: u64 = 10_000;

/// Default page size for list queries.
pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 1000;

/// Operator recorded when a request carries none.
pub const SYSTEM_OPERATOR: &str = "system";

/// Default pub/sub topic for signalling envelopes.
pub const SIGNALLING_TOPIC: &str = "bscp.signalling.release";
