//! Error types and error codes for BSCP
//!
//! This module defines:
//! - `BscpError`: Application-specific error enum
//! - `ErrorKind`: The coarse taxonomy every error maps to
//! - `AppError`: Wrapper for integration with the binary edge
//! - `ErrorCode`: Structured error codes for RPC responses

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Coarse error taxonomy carried by every failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    AlreadyExists,
    IllegalStateTransition,
    StorageFailure,
    SystemUnknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::IllegalStateTransition => "IllegalStateTransition",
            ErrorKind::StorageFailure => "StorageFailure",
            ErrorKind::SystemUnknown => "SystemUnknown",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum BscpError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} '{key}' already exists")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("{entity} {id} cannot move from {from} to {to}")]
    IllegalStateTransition {
        entity: &'static str,
        id: i64,
        from: String,
        to: String,
    },

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("shard unavailable: {0}")]
    ShardUnavailable(String),

    #[error("timed out after {0}ms: {1}")]
    Timeout(u64, String),

    #[error("downstream error: {0}")]
    DownstreamError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl BscpError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BscpError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, key: impl ToString) -> Self {
        BscpError::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }

    pub fn illegal_transition(
        entity: &'static str,
        id: i64,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        BscpError::IllegalStateTransition {
            entity,
            id,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BscpError::InvalidInput(_) => ErrorKind::InvalidInput,
            BscpError::NotFound { .. } => ErrorKind::NotFound,
            BscpError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            BscpError::IllegalStateTransition { .. } => ErrorKind::IllegalStateTransition,
            BscpError::DatabaseError(_)
            | BscpError::ShardUnavailable(_)
            | BscpError::Timeout(..) => ErrorKind::StorageFailure,
            BscpError::DownstreamError(_) | BscpError::InternalError(_) => {
                ErrorKind::SystemUnknown
            }
        }
    }

    /// The stable numeric code reported in response bodies.
    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            BscpError::ShardUnavailable(_) => SHARD_UNAVAILABLE,
            BscpError::Timeout(..) => STORAGE_TIMEOUT,
            _ => match self.kind() {
                ErrorKind::InvalidInput => PARAMETER_VALIDATE_ERROR,
                ErrorKind::NotFound => RESOURCE_NOT_FOUND,
                ErrorKind::AlreadyExists => RESOURCE_CONFLICT,
                ErrorKind::IllegalStateTransition => ILLEGAL_STATE,
                ErrorKind::StorageFailure => DATA_ACCESS_ERROR,
                ErrorKind::SystemUnknown => SERVER_ERROR,
            },
        }
    }
}

/// Wrapper for application errors
#[derive(Debug)]
pub struct AppError {
    inner: anyhow::Error,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError { inner: value }
    }
}

impl From<BscpError> for AppError {
    fn from(value: BscpError) -> Self {
        AppError {
            inner: anyhow::Error::new(value),
        }
    }
}

impl AppError {
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Kind of the wrapped error, `SystemUnknown` for anything that is not a `BscpError`.
    pub fn kind(&self) -> ErrorKind {
        self.downcast_ref::<BscpError>()
            .map(BscpError::kind)
            .unwrap_or(ErrorKind::SystemUnknown)
    }
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const PARAMETER_MISSING: ErrorCode<'static> = ErrorCode {
    code: 10000,
    message: "parameter missing",
};

pub const ACCESS_DENIED: ErrorCode<'static> = ErrorCode {
    code: 10001,
    message: "access denied",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

pub const SHARD_UNAVAILABLE: ErrorCode<'static> = ErrorCode {
    code: 10003,
    message: "database shard unavailable",
};

pub const STORAGE_TIMEOUT: ErrorCode<'static> = ErrorCode {
    code: 10004,
    message: "storage call timed out",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const RESOURCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 20004,
    message: "resource not found",
};

pub const RESOURCE_CONFLICT: ErrorCode<'static> = ErrorCode {
    code: 20005,
    message: "resource conflict",
};

pub const STRATEGY_FORMAT_INVALID: ErrorCode<'static> = ErrorCode {
    code: 20011,
    message: "strategy format invalid",
};

pub const ILLEGAL_STATE: ErrorCode<'static> = ErrorCode {
    code: 23000,
    message: "illegal state",
};

pub const SERVER_ERROR: ErrorCode<'static> = ErrorCode {
    code: 30000,
    message: "server error",
};

pub const UNKNOWN_REQUEST_TYPE: ErrorCode<'static> = ErrorCode {
    code: 30001,
    message: "unknown request type",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bscp_error_display() {
        let err = BscpError::InvalidInput("memo too long".to_string());
        assert_eq!(format!("{}", err), "invalid input: memo too long");

        let err = BscpError::not_found("commit", 42);
        assert_eq!(format!("{}", err), "commit 42 not found");

        let err = BscpError::illegal_transition("release", 7, "Canceled", "Published");
        assert_eq!(
            format!("{}", err),
            "release 7 cannot move from Canceled to Published"
        );
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            BscpError::InvalidInput(String::new()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            BscpError::already_exists("strategy", "gray").kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            BscpError::ShardUnavailable("shard 1".to_string()).kind(),
            ErrorKind::StorageFailure
        );
        assert_eq!(
            BscpError::Timeout(500, "query".to_string()).kind(),
            ErrorKind::StorageFailure
        );
        assert_eq!(
            BscpError::DownstreamError("blob".to_string()).kind(),
            ErrorKind::SystemUnknown
        );
    }

    #[test]
    fn test_shard_errors_keep_distinct_code() {
        let err = BscpError::ShardUnavailable("shard 2".to_string());
        assert_eq!(err.error_code().code, SHARD_UNAVAILABLE.code);
        assert_ne!(err.error_code().code, RESOURCE_NOT_FOUND.code);
    }

    #[test]
    fn test_app_error_kind() {
        let app_err = AppError::from(BscpError::not_found("release", 1));
        assert_eq!(app_err.kind(), ErrorKind::NotFound);

        let app_err = AppError::from(anyhow::anyhow!("boom"));
        assert_eq!(app_err.kind(), ErrorKind::SystemUnknown);
        assert_eq!(format!("{}", app_err), "boom");
    }
}
