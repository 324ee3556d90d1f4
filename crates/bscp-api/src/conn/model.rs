//! Sidecar-facing RPC models.
//!
//! `Access`, `Report`, `PullRelease` and `PullConfigList` are called by the
//! sidecars themselves; the `Tunnel*` requests carry the same operations for
//! callers that reach a connection server through the unary transport only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use bscp_common::BscpResult;

use crate::{
    impl_request, impl_response,
    model::{ConfigItemInfo, ContentRef, EffectInfo, ReleaseInfo, ReloadSpec},
    release::ReleaseRef,
    remote::{Request, Response},
    validation::{ValidateRequest, check, validate_id, validate_labels, validate_niceness},
};

/// Identity every sidecar call carries.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceIdentity {
    pub biz_id: i64,
    pub app_id: i64,
    #[serde(default)]
    pub cloud_id: i64,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl InstanceIdentity {
    pub fn validate(&self) -> BscpResult<()> {
        check("bizId", validate_id(self.biz_id))?;
        check("appId", validate_id(self.app_id))?;
        check("labels", validate_labels(&self.labels))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub identity: InstanceIdentity,
    #[serde(default)]
    pub client_version: String,
}

impl_request!(AccessRequest, "AccessRequest");

impl ValidateRequest for AccessRequest {
    fn validate(&self) -> BscpResult<()> {
        self.identity.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    #[serde(flatten)]
    pub response: Response,
    pub heartbeat_interval_ms: u64,
    pub pull_interval_ms: u64,
    /// Open sessions on this server, in total and for the caller's business.
    pub session_count: usize,
    pub biz_session_count: usize,
}

impl_response!(AccessResponse, "AccessResponse");

/// Periodic state report: which release is in effect and how the last
/// reload went.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub identity: InstanceIdentity,
    #[serde(default)]
    pub effects: Vec<EffectInfo>,
    #[serde(default)]
    pub reload_success: bool,
    #[serde(default)]
    pub reload_message: String,
}

impl_request!(ReportRequest, "ReportRequest");

impl ValidateRequest for ReportRequest {
    fn validate(&self) -> BscpResult<()> {
        self.identity.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(ReportResponse, "ReportResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub identity: InstanceIdentity,
    pub cfg_id: i64,
}

impl_request!(PullReleaseRequest, "PullReleaseRequest");

impl ValidateRequest for PullReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.identity.validate()?;
        check("cfgId", validate_id(self.cfg_id))
    }
}

/// Newest matching release, if any, with the content it points at.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
    pub release: Option<ReleaseInfo>,
    pub content: Option<ContentRef>,
}

impl_response!(PullReleaseResponse, "PullReleaseResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullConfigListRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub identity: InstanceIdentity,
}

impl_request!(PullConfigListRequest, "PullConfigListRequest");

impl ValidateRequest for PullConfigListRequest {
    fn validate(&self) -> BscpResult<()> {
        self.identity.validate()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullConfigListResponse {
    #[serde(flatten)]
    pub response: Response,
    pub config_items: Vec<ConfigItemInfo>,
}

impl_response!(PullConfigListResponse, "PullConfigListResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelPublishReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: ReleaseRef,
    #[serde(default)]
    pub niceness: u64,
}

impl_request!(TunnelPublishReleaseRequest, "TunnelPublishReleaseRequest");

impl ValidateRequest for TunnelPublishReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()?;
        check("niceness", validate_niceness(self.niceness))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelPublishReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(TunnelPublishReleaseResponse, "TunnelPublishReleaseResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelReloadRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: ReleaseRef,
    #[serde(default)]
    pub reload_spec: ReloadSpec,
    #[serde(default)]
    pub niceness: u64,
}

impl_request!(TunnelReloadRequest, "TunnelReloadRequest");

impl ValidateRequest for TunnelReloadRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()?;
        check("niceness", validate_niceness(self.niceness))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelReloadResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(TunnelReloadResponse, "TunnelReloadResponse");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelRollbackReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub target: ReleaseRef,
    #[serde(default)]
    pub niceness: u64,
}

impl_request!(TunnelRollbackReleaseRequest, "TunnelRollbackReleaseRequest");

impl ValidateRequest for TunnelRollbackReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.target.validate()?;
        check("niceness", validate_niceness(self.niceness))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelRollbackReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
}

impl_response!(
    TunnelRollbackReleaseResponse,
    "TunnelRollbackReleaseResponse"
);

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelPullReleaseRequest {
    #[serde(flatten)]
    pub request: Request,
    #[serde(flatten)]
    pub identity: InstanceIdentity,
    pub cfg_id: i64,
}

impl_request!(TunnelPullReleaseRequest, "TunnelPullReleaseRequest");

impl ValidateRequest for TunnelPullReleaseRequest {
    fn validate(&self) -> BscpResult<()> {
        self.identity.validate()?;
        check("cfgId", validate_id(self.cfg_id))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelPullReleaseResponse {
    #[serde(flatten)]
    pub response: Response,
    pub release: Option<ReleaseInfo>,
    pub content: Option<ContentRef>,
}

impl_response!(TunnelPullReleaseResponse, "TunnelPullReleaseResponse");
