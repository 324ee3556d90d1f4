//! Storage error mapping and per-call timeouts.

use std::{future::Future, time::Duration};

use sea_orm::{DbErr, SqlErr};

use bscp_common::{BscpError, BscpResult};

/// Map a database error onto the error taxonomy.
///
/// Unique-key violations become `AlreadyExists`, lost connections become
/// `ShardUnavailable`, everything else is a `DatabaseError`.
pub fn storage_error(err: DbErr) -> BscpError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return BscpError::already_exists("record", detail);
    }
    match err {
        DbErr::ConnectionAcquire(e) => BscpError::ShardUnavailable(e.to_string()),
        DbErr::Conn(e) => BscpError::ShardUnavailable(e.to_string()),
        other => BscpError::DatabaseError(other.to_string()),
    }
}

/// Run one database round-trip under a deadline.
///
/// The future is dropped on expiry, so an open transaction inside it rolls
/// back rather than committing partially.
pub async fn timed<T, F>(timeout: Duration, op: &'static str, fut: F) -> BscpResult<T>
where
    F: Future<Output = BscpResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            metrics::counter!("bscp_db_timeouts_total", "op" => op).increment(1);
            tracing::warn!(op, timeout_ms = timeout.as_millis() as u64, "Database call timed out");
            Err(BscpError::Timeout(timeout.as_millis() as u64, op.to_string()))
        }
    }
}
