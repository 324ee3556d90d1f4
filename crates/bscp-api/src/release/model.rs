//! Request and response models for the commit, release, strategy and config
//! item RPCs.

use serde::{Deserialize, Serialize};

use bscp_common::{BscpError, BscpResult};

use crate::{
    impl_request, impl_response,
    model::{
        CommitInfo, CommitSpec, ConfigItemInfo, ItemResult, MultiCommitInfo, MultiReleaseInfo,
        ReleaseInfo, ReloadSpec, StrategyInfo,
    },
    remote::{Request, Response},
    validation::{
        ValidateRequest, check, validate_batch, validate_commit_spec, validate_id, validate_memo,
        validate_name, validate_niceness, validate_path,
    },
};

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommitRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub app_id: i64,
    #[serde(flatten)]
    pub spec: CommitSpec,
}

impl_request!(CreateCommitRequest, "CreateCommitRequest");

impl ValidateRequest for CreateCommitRequest {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("appId", validate_id(self.app_id))?;
        validate_commit_spec(&self.spec)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommitResponse {
    #[serde(flatten)]
    pub response: Response,
    pub id: i64,
}

impl_response!(CreateCommitResponse, "CreateCommitResponse");

/// Addresses one commit of a business.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRef {
    pub biz_id: i64,
    pub commit_id: i64,
}

impl CommitRef {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("commitId", validate_id(self.commit_id))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmCommitRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: CommitRef,
}

impl_request!(ConfirmCommitRequest, "ConfirmCommitRequest");

impl ValidateRequest for ConfirmCommitRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmCommitResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(ConfirmCommitResponse, "ConfirmCommitResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelCommitRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: CommitRef,
}

impl_request!(CancelCommitRequest, "CancelCommitRequest");

impl ValidateRequest for CancelCommitRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelCommitResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(CancelCommitResponse, "CancelCommitResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCommitRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: CommitRef,
}

impl_request!(QueryCommitRequest, "QueryCommitRequest");

impl ValidateRequest for QueryCommitRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCommitResponse {
    #[serde(flatten)]
    pub response: Response,
    pub commit: Option<CommitInfo>,
}

impl_response!(QueryCommitResponse, "QueryCommitResponse");

// ---------------------------------------------------------------------------
// Multi commits
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMultiCommitRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub app_id: i64,
    /// Existing Init multi commit to append to; 0 creates a new one.
    #[serde(default)]
    pub reuse_commit_id: i64,
    #[serde(default)]
    pub memo: String,
    pub items: Vec<CommitSpec>,
}

impl_request!(CreateMultiCommitRequest, "CreateMultiCommitRequest");

impl ValidateRequest for CreateMultiCommitRequest {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("appId", validate_id(self.app_id))?;
        check("memo", validate_memo(&self.memo))?;
        check("items", validate_batch(&self.items))?;
        if self.reuse_commit_id < 0 {
            return Err(BscpError::InvalidInput(
                "reuseCommitId: id_must_be_positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMultiCommitResponse {
    #[serde(flatten)]
    pub response: Response,
    pub multi_commit_id: i64,
    pub results: Vec<ItemResult>,
}

impl_response!(CreateMultiCommitResponse, "CreateMultiCommitResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiCommitRef {
    pub biz_id: i64,
    pub multi_commit_id: i64,
}

impl MultiCommitRef {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("multiCommitId", validate_id(self.multi_commit_id))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmMultiCommitRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: MultiCommitRef,
}

impl_request!(ConfirmMultiCommitRequest, "ConfirmMultiCommitRequest");

impl ValidateRequest for ConfirmMultiCommitRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmMultiCommitResponse {
    #[serde(flatten)]
    pub response: Response,
    pub results: Vec<ItemResult>,
}

impl_response!(ConfirmMultiCommitResponse, "ConfirmMultiCommitResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelMultiCommitRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: MultiCommitRef,
}

impl_request!(CancelMultiCommitRequest, "CancelMultiCommitRequest");

impl ValidateRequest for CancelMultiCommitRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelMultiCommitResponse {
    #[serde(flatten)]
    pub response: Response,
    pub results: Vec<ItemResult>,
}

impl_response!(CancelMultiCommitResponse, "CancelMultiCommitResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMultiCommitRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: MultiCommitRef,
}

impl_request!(QueryMultiCommitRequest, "QueryMultiCommitRequest");

impl ValidateRequest for QueryMultiCommitRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMultiCommitResponse {
    #[serde(flatten)]
    pub response: Response,
    pub multi_commit: Option<MultiCommitInfo>,
}

impl_response!(QueryMultiCommitResponse, "QueryMultiCommitResponse");

// ---------------------------------------------------------------------------
// Releases
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub app_id: i64,
    pub commit_id: i64,
    /// 0 binds the release to the empty (match-all) strategy.
    #[serde(default)]
    pub strategy_id: i64,
    pub name: String,
    #[serde(default)]
    pub memo: String,
}

impl_request!(CreateReleaseRequest, "CreateReleaseRequest");

impl ValidateRequest for CreateReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("appId", validate_id(self.app_id))?;
        check("commitId", validate_id(self.commit_id))?;
        check("name", validate_name(&self.name))?;
        check("memo", validate_memo(&self.memo))?;
        if self.strategy_id < 0 {
            return Err(BscpError::InvalidInput(
                "strategyId: id_must_be_positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
    pub id: i64,
}

impl_response!(CreateReleaseResponse, "CreateReleaseResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRef {
    pub biz_id: i64,
    pub release_id: i64,
}

impl ReleaseRef {
    pub fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("releaseId", validate_id(self.release_id))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: ReleaseRef,
}

impl_request!(CancelReleaseRequest, "CancelReleaseRequest");

impl ValidateRequest for CancelReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(CancelReleaseResponse, "CancelReleaseResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: ReleaseRef,
    /// Pause in milliseconds between pushes to matching sessions.
    #[serde(default)]
    pub niceness: u64,
}

impl_request!(PublishReleaseRequest, "PublishReleaseRequest");

impl ValidateRequest for PublishReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()?;
        check("niceness", validate_niceness(self.niceness))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(PublishReleaseResponse, "PublishReleaseResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: ReleaseRef,
    #[serde(default)]
    pub niceness: u64,
}

impl_request!(RollbackReleaseRequest, "RollbackReleaseRequest");

impl ValidateRequest for RollbackReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()?;
        check("niceness", validate_niceness(self.niceness))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(RollbackReleaseResponse, "RollbackReleaseResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: ReleaseRef,
    #[serde(default)]
    pub reload_spec: ReloadSpec,
    #[serde(default)]
    pub niceness: u64,
}

impl_request!(ReloadRequest, "ReloadRequest");

impl ValidateRequest for ReloadRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()?;
        check("niceness", validate_niceness(self.niceness))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(ReloadResponse, "ReloadResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: ReleaseRef,
}

impl_request!(QueryReleaseRequest, "QueryReleaseRequest");

impl ValidateRequest for QueryReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
    pub release: Option<ReleaseInfo>,
}

impl_response!(QueryReleaseResponse, "QueryReleaseResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryNewestReleasesRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub cfg_id: i64,
    #[serde(default = "default_page_number")]
    pub page_number: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page_number() -> u64 {
    1
}

fn default_page_size() -> u64 {
    bscp_common::DEFAULT_PAGE_SIZE
}

impl_request!(QueryNewestReleasesRequest, "QueryNewestReleasesRequest");

impl ValidateRequest for QueryNewestReleasesRequest {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("cfgId", validate_id(self.cfg_id))?;
        if self.page_number == 0 {
            return Err(BscpError::InvalidInput(
                "pageNumber: must start at 1".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > bscp_common::MAX_PAGE_SIZE {
            return Err(BscpError::InvalidInput(format!(
                "pageSize: must be within 1..={}",
                bscp_common::MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryNewestReleasesResponse {
    #[serde(flatten)]
    pub response: Response,
    pub total_count: u64,
    pub page_number: u64,
    pub pages_available: u64,
    pub releases: Vec<ReleaseInfo>,
}

impl_response!(QueryNewestReleasesResponse, "QueryNewestReleasesResponse");

// ---------------------------------------------------------------------------
// Multi releases
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMultiReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub app_id: i64,
    pub multi_commit_id: i64,
    #[serde(default)]
    pub strategy_id: i64,
    pub name: String,
    #[serde(default)]
    pub memo: String,
}

impl_request!(CreateMultiReleaseRequest, "CreateMultiReleaseRequest");

impl ValidateRequest for CreateMultiReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("appId", validate_id(self.app_id))?;
        check("multiCommitId", validate_id(self.multi_commit_id))?;
        check("name", validate_name(&self.name))?;
        check("memo", validate_memo(&self.memo))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMultiReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
    pub multi_release_id: i64,
    pub results: Vec<ItemResult>,
}

impl_response!(CreateMultiReleaseResponse, "CreateMultiReleaseResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiReleaseRef {
    pub biz_id: i64,
    pub multi_release_id: i64,
}

impl MultiReleaseRef {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("multiReleaseId", validate_id(self.multi_release_id))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishMultiReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: MultiReleaseRef,
    #[serde(default)]
    pub niceness: u64,
}

impl_request!(PublishMultiReleaseRequest, "PublishMultiReleaseRequest");

impl ValidateRequest for PublishMultiReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()?;
        check("niceness", validate_niceness(self.niceness))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishMultiReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(PublishMultiReleaseResponse, "PublishMultiReleaseResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelMultiReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: MultiReleaseRef,
}

impl_request!(CancelMultiReleaseRequest, "CancelMultiReleaseRequest");

impl ValidateRequest for CancelMultiReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelMultiReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(CancelMultiReleaseResponse, "CancelMultiReleaseResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMultiReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: MultiReleaseRef,
}

impl_request!(QueryMultiReleaseRequest, "QueryMultiReleaseRequest");

impl ValidateRequest for QueryMultiReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMultiReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
    pub multi_release: Option<MultiReleaseInfo>,
}

impl_response!(QueryMultiReleaseResponse, "QueryMultiReleaseResponse");

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStrategyRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub app_id: i64,
    pub name: String,
    /// Clause tree; parsed into a typed predicate when the strategy is created.
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub memo: String,
}

impl_request!(CreateStrategyRequest, "CreateStrategyRequest");

impl ValidateRequest for CreateStrategyRequest {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("appId", validate_id(self.app_id))?;
        check("name", validate_name(&self.name))?;
        check("memo", validate_memo(&self.memo))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStrategyResponse {
    #[serde(flatten)]
    pub response: Response,
    pub id: i64,
}

impl_response!(CreateStrategyResponse, "CreateStrategyResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStrategyRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub strategy_id: i64,
}

impl_request!(QueryStrategyRequest, "QueryStrategyRequest");

impl ValidateRequest for QueryStrategyRequest {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("strategyId", validate_id(self.strategy_id))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStrategyResponse {
    #[serde(flatten)]
    pub response: Response,
    pub strategy: Option<StrategyInfo>,
}

impl_response!(QueryStrategyResponse, "QueryStrategyResponse");

// ---------------------------------------------------------------------------
// Config items
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConfigItemRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub app_id: i64,
    pub name: String,
    pub path: String,
    #[serde(default = "default_file_type")]
    pub file_type: String,
    #[serde(default)]
    pub memo: String,
}

fn default_file_type() -> String {
    "text".to_string()
}

impl_request!(CreateConfigItemRequest, "CreateConfigItemRequest");

impl ValidateRequest for CreateConfigItemRequest {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("appId", validate_id(self.app_id))?;
        check("name", validate_name(&self.name))?;
        check("path", validate_path(&self.path))?;
        check("memo", validate_memo(&self.memo))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConfigItemResponse {
    #[serde(flatten)]
    pub response: Response,
    pub id: i64,
}

impl_response!(CreateConfigItemResponse, "CreateConfigItemResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfigItemRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub config_item_id: i64,
}

impl_request!(QueryConfigItemRequest, "QueryConfigItemRequest");

impl ValidateRequest for QueryConfigItemRequest {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("configItemId", validate_id(self.config_item_id))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfigItemResponse {
    #[serde(flatten)]
    pub response: Response,
    pub config_item: Option<ConfigItemInfo>,
}

impl_response!(QueryConfigItemResponse, "QueryConfigItemResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConfigItemsRequest {
    #[serde(flatten)]
    pub request: Request,
    pub biz_id: i64,
    pub app_id: i64,
}

impl_request!(ListConfigItemsRequest, "ListConfigItemsRequest");

impl ValidateRequest for ListConfigItemsRequest {
    fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("appId", validate_id(self.app_id))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConfigItemsResponse {
    #[serde(flatten)]
    pub response: Response,
    pub config_items: Vec<ConfigItemInfo>,
}

impl_response!(ListConfigItemsResponse, "ListConfigItemsResponse");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RequestTrait;
    use bscp_common::ErrorKind;

    #[test]
    fn test_create_commit_request_flattens_spec() {
        let request: CreateCommitRequest = serde_json::from_str(
            r#"{"requestId":"r1","bizId":2,"appId":3,"cfgsetId":4,"templateId":9,"memo":"m"}"#,
        )
        .unwrap();

        assert_eq!(request.request_id(), "r1");
        assert_eq!(request.spec.cfgset_id, 4);
        assert_eq!(request.spec.template_id, Some(9));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_commit_request_rejects_zero_biz() {
        let request = CreateCommitRequest {
            app_id: 1,
            spec: CommitSpec {
                cfgset_id: 1,
                ..Default::default()
            },
            ..Default::default()
        };

        assert_eq!(
            request.validate().unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_newest_releases_defaults_paging() {
        let request: QueryNewestReleasesRequest =
            serde_json::from_str(r#"{"bizId":1,"cfgId":2}"#).unwrap();

        assert_eq!(request.page_number, 1);
        assert_eq!(request.page_size, bscp_common::DEFAULT_PAGE_SIZE);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_multi_commit_request_requires_items() {
        let request = CreateMultiCommitRequest {
            biz_id: 1,
            app_id: 1,
            ..Default::default()
        };

        assert!(request.validate().is_err());
    }

    #[test]
    fn test_multi_commit_item_without_cfgset_decodes() {
        let request: CreateMultiCommitRequest = serde_json::from_str(
            r#"{"bizId":1,"appId":2,"items":[{"cfgsetId":5,"templateId":1},{"templateId":2}]}"#,
        )
        .unwrap();

        assert!(request.validate().is_ok());
        assert_eq!(request.items[1].cfgset_id, 0);
    }

    #[test]
    fn test_publish_rejects_large_niceness() {
        let mut request: PublishReleaseRequest =
            serde_json::from_str(r#"{"bizId":1,"releaseId":2,"niceness":3600000}"#).unwrap();
        assert_eq!(
            request.validate().unwrap_err().to_string(),
            "invalid input: niceness: niceness_too_large"
        );

        request.niceness = bscp_common::MAX_NICENESS_MS;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_type_names() {
        assert_eq!(
            PublishReleaseRequest::default().request_type(),
            "PublishReleaseRequest"
        );
        assert_eq!(
            CancelMultiCommitResponse::RESPONSE_TYPE,
            "CancelMultiCommitResponse"
        );
    }
}
