//! Input validation utilities for BSCP API
//!
//! Field checks return [`ValidationError`]s; requests implement
//! [`ValidateRequest`] and surface the first failing check as
//! `BscpError::InvalidInput`.

use bscp_common::{
    BscpError, BscpResult, MAX_MEMO_LEN, MAX_NICENESS_MS, is_sha256, is_valid_name,
};
use validator::ValidationError;

use crate::model::{CommitSpec, ContentRef};

/// Maximum length for a config item path
pub const MAX_PATH_LENGTH: usize = 1024;

/// Maximum number of items accepted by one batch request
pub const MAX_BATCH_SIZE: usize = 500;

/// Maximum number of labels reported by one instance
pub const MAX_LABEL_COUNT: usize = 64;

/// Implemented by every request that carries caller-supplied fields.
pub trait ValidateRequest {
    fn validate(&self) -> BscpResult<()>;
}

/// Attach the field name to a failed check.
pub fn check(field: &str, result: Result<(), ValidationError>) -> BscpResult<()> {
    result.map_err(|e| BscpError::InvalidInput(format!("{}: {}", field, e.code)))
}

/// Validate an id that must reference an existing row
pub fn validate_id(id: i64) -> Result<(), ValidationError> {
    if id <= 0 {
        return Err(ValidationError::new("id_must_be_positive"));
    }
    Ok(())
}

/// Validate a resource name (release, strategy, config item)
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("name_empty"));
    }
    if !is_valid_name(name) {
        return Err(ValidationError::new("name_invalid"));
    }
    Ok(())
}

/// Validate a memo attached to a commit or release
pub fn validate_memo(memo: &str) -> Result<(), ValidationError> {
    if memo.chars().count() > MAX_MEMO_LEN {
        return Err(ValidationError::new("memo_too_long"));
    }
    Ok(())
}

/// Validate a config item path, which must be absolute
pub fn validate_path(path: &str) -> Result<(), ValidationError> {
    if !path.starts_with('/') {
        return Err(ValidationError::new("path_not_absolute"));
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::new("path_too_long"));
    }
    Ok(())
}

/// Validate a content reference
pub fn validate_content_ref(content: &ContentRef) -> Result<(), ValidationError> {
    if !is_sha256(&content.content_id) {
        return Err(ValidationError::new("content_id_not_sha256"));
    }
    Ok(())
}

/// Validate a batch length
pub fn validate_batch<T>(items: &[T]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::new("batch_empty"));
    }
    if items.len() > MAX_BATCH_SIZE {
        return Err(ValidationError::new("batch_too_large"));
    }
    Ok(())
}

/// Validate the pause requested between signalling pushes
pub fn validate_niceness(niceness: u64) -> Result<(), ValidationError> {
    if niceness > MAX_NICENESS_MS {
        return Err(ValidationError::new("niceness_too_large"));
    }
    Ok(())
}

/// Validate the source of one commit: at most one kind may be set
pub fn validate_commit_spec(spec: &CommitSpec) -> BscpResult<()> {
    check("cfgsetId", validate_id(spec.cfgset_id))?;
    check("memo", validate_memo(&spec.memo))?;
    if spec.source_count() > 1 {
        return Err(BscpError::InvalidInput(
            "only one of content, template or templateId may be set".to_string(),
        ));
    }
    if let Some(content) = &spec.content {
        check("content", validate_content_ref(content))?;
    }
    Ok(())
}

/// Validate the labels reported by an instance
pub fn validate_labels(
    labels: &std::collections::HashMap<String, String>,
) -> Result<(), ValidationError> {
    if labels.len() > MAX_LABEL_COUNT {
        return Err(ValidationError::new("too_many_labels"));
    }
    if labels.keys().any(|k| k.is_empty()) {
        return Err(ValidationError::new("label_key_empty"));
    }
    Ok(())
}
