//! Wire models shared by the release pipeline RPCs and the signalling bus.

use serde::{Deserialize, Serialize};

/// Reference to a content blob held by the external blob store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub content_id: String,
    pub content_size: u64,
}

/// One proposed change of a config item, as submitted by a caller.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSpec {
    #[serde(default)]
    pub cfgset_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<i64>,
    #[serde(default)]
    pub memo: String,
}

impl CommitSpec {
    /// Number of source kinds set on this spec; valid specs carry at most one.
    pub fn source_count(&self) -> usize {
        [
            self.content.is_some(),
            self.template.as_deref().is_some_and(|t| !t.is_empty()),
            self.template_id.is_some_and(|id| id > 0),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub id: i64,
    pub biz_id: i64,
    pub app_id: i64,
    pub cfgset_id: i64,
    pub content: Option<ContentRef>,
    pub template: Option<String>,
    pub template_id: Option<i64>,
    pub multi_commit_id: i64,
    pub release_id: i64,
    pub state: String,
    pub memo: String,
    pub creator: String,
    pub last_modify_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiCommitInfo {
    pub id: i64,
    pub biz_id: i64,
    pub app_id: i64,
    pub multi_release_id: i64,
    pub state: String,
    pub memo: String,
    pub commits: Vec<CommitInfo>,
    pub creator: String,
    pub last_modify_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub id: i64,
    pub biz_id: i64,
    pub app_id: i64,
    pub cfg_id: i64,
    pub commit_id: i64,
    pub name: String,
    pub strategy_id: i64,
    pub strategies: String,
    pub multi_release_id: i64,
    pub state: String,
    pub memo: String,
    pub creator: String,
    pub last_modify_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiReleaseInfo {
    pub id: i64,
    pub biz_id: i64,
    pub app_id: i64,
    pub multi_commit_id: i64,
    pub strategy_id: i64,
    pub name: String,
    pub state: String,
    pub memo: String,
    pub releases: Vec<ReleaseInfo>,
    pub creator: String,
    pub last_modify_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyInfo {
    pub id: i64,
    pub biz_id: i64,
    pub app_id: i64,
    pub name: String,
    pub content: serde_json::Value,
    pub memo: String,
    pub creator: String,
    pub created_at: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigItemInfo {
    pub id: i64,
    pub biz_id: i64,
    pub app_id: i64,
    pub name: String,
    pub path: String,
    pub file_type: String,
    pub state: String,
    pub memo: String,
    pub creator: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Outcome of one member of a best-effort batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub cfgset_id: i64,
    pub id: i64,
    pub success: bool,
    pub error_code: i32,
    pub message: String,
}

impl ItemResult {
    pub fn ok(cfgset_id: i64, id: i64) -> Self {
        Self {
            cfgset_id,
            id,
            success: true,
            error_code: bscp_common::error::SUCCESS.code,
            message: bscp_common::error::SUCCESS.message.to_string(),
        }
    }

    pub fn failed(cfgset_id: i64, id: i64, err: &bscp_common::BscpError) -> Self {
        Self {
            cfgset_id,
            id,
            success: false,
            error_code: err.error_code().code,
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignallingType {
    #[default]
    Publish,
    Reload,
    Rollback,
}

impl SignallingType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignallingType::Publish => "Publish",
            SignallingType::Reload => "Reload",
            SignallingType::Rollback => "Rollback",
        }
    }
}

impl std::fmt::Display for SignallingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Effective release of one config item after a reload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectInfo {
    pub cfg_id: i64,
    pub release_id: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadSpec {
    #[serde(default)]
    pub rollback: bool,
    #[serde(default)]
    pub multi_release_id: i64,
    #[serde(default)]
    pub info: Vec<EffectInfo>,
}

/// What is being published, and to whom.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publishing {
    pub biz_id: i64,
    pub app_id: i64,
    pub cfg_id: i64,
    pub release_id: i64,
    /// Serialized targeting predicate of the release.
    pub strategies: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reload_spec: Option<ReloadSpec>,
    /// Pause in milliseconds between consecutive pushes.
    #[serde(default)]
    pub niceness: u64,
}

/// Transient fan-out event; never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signalling {
    #[serde(rename = "type")]
    pub signalling_type: SignallingType,
    pub publishing: Publishing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_count() {
        let mut spec = CommitSpec {
            cfgset_id: 1,
            ..Default::default()
        };
        assert_eq!(spec.source_count(), 0);

        spec.content = Some(ContentRef {
            content_id: "a".repeat(64),
            content_size: 12,
        });
        assert_eq!(spec.source_count(), 1);

        spec.template = Some(String::new());
        assert_eq!(spec.source_count(), 1);

        spec.template_id = Some(3);
        assert_eq!(spec.source_count(), 2);
    }

    #[test]
    fn test_signalling_envelope_json() {
        let signalling: Signalling = serde_json::from_str(
            r#"{"type":"Reload","publishing":{"bizId":1,"appId":2,"cfgId":3,"releaseId":4,
                "strategies":"{}","reloadSpec":{"rollback":true,"info":[{"cfgId":3,"releaseId":4}]}}}"#,
        )
        .unwrap();

        assert_eq!(signalling.signalling_type, SignallingType::Reload);
        assert_eq!(signalling.publishing.niceness, 0);
        let reload = signalling.publishing.reload_spec.unwrap();
        assert!(reload.rollback);
        assert_eq!(reload.info[0].release_id, 4);
    }

    #[test]
    fn test_item_result_failed_keeps_code() {
        let err = bscp_common::BscpError::not_found("config item", 8);
        let result = ItemResult::failed(8, 0, &err);
        assert!(!result.success);
        assert_eq!(result.error_code, err.error_code().code);
        assert_eq!(result.message, "config item 8 not found");
    }
}
