// Sidecar-facing gRPC handlers
// Access handshake, state reports and the pull fallback used when a
// signalling push was missed.

use std::sync::Arc;

use tracing::debug;

use bscp_api::{
    ContentRef, ReleaseInfo,
    conn::{
        AccessRequest, AccessResponse, InstanceIdentity, PullConfigListRequest,
        PullConfigListResponse, PullReleaseRequest, PullReleaseResponse, ReportRequest,
        ReportResponse,
    },
};
use bscp_common::{BscpError, BscpResult};
use bscp_core::{Connection, SessionReport, handler::rpc::AuthRequirement};

use crate::model::AppState;

/// The identity a sidecar reports, with its IP taken from the connection
/// when the request carries none.
pub fn resolve_identity(
    mut identity: InstanceIdentity,
    connection: &Connection,
) -> InstanceIdentity {
    if identity.ip.is_empty() {
        identity.ip = if connection.meta_info.client_ip.is_empty() {
            connection.meta_info.remote_ip.clone()
        } else {
            connection.meta_info.client_ip.clone()
        };
    }
    identity
}

/// Newest Published release of `cfg_id` whose strategy matches the
/// instance's labels.
pub async fn pull_release(
    app_state: &AppState,
    identity: &InstanceIdentity,
    cfg_id: i64,
) -> BscpResult<(ReleaseInfo, Option<ContentRef>)> {
    app_state
        .releases
        .newest_matching(identity.biz_id, identity.app_id, cfg_id, &identity.labels)
        .await?
        .ok_or_else(|| BscpError::not_found("release", format!("cfg {}", cfg_id)))
}

// Handler for AccessRequest - handshake before the signalling stream opens
#[derive(Clone)]
pub struct AccessHandler {
    pub app_state: Arc<AppState>,
}

impl AccessHandler {
    async fn execute(
        &self,
        connection: &Connection,
        request: AccessRequest,
    ) -> BscpResult<AccessResponse> {
        let identity = resolve_identity(request.identity, connection);
        debug!(
            biz_id = identity.biz_id,
            app_id = identity.app_id,
            ip = %identity.ip,
            client_version = %request.client_version,
            "Sidecar access"
        );

        let configuration = &self.app_state.configuration;
        Ok(AccessResponse {
            heartbeat_interval_ms: configuration.heartbeat_interval_ms(),
            pull_interval_ms: configuration.pull_interval_ms(),
            session_count: self.app_state.sessions.count(),
            biz_session_count: self.app_state.sessions.count_by_biz(identity.biz_id),
            ..AccessResponse::new()
        })
    }
}

impl_payload_handler!(AccessHandler, AccessRequest, AuthRequirement::None);

// Handler for ReportRequest - fire-and-forget; never triggers a push
#[derive(Clone)]
pub struct ReportHandler {
    pub app_state: Arc<AppState>,
}

impl ReportHandler {
    async fn execute(
        &self,
        connection: &Connection,
        request: ReportRequest,
    ) -> BscpResult<ReportResponse> {
        let identity = resolve_identity(request.identity, connection);
        self.app_state.sessions.record_report(
            &identity,
            SessionReport {
                effects: request.effects,
                reload_success: request.reload_success,
                reload_message: request.reload_message,
                reported_at: chrono::Utc::now().timestamp_millis(),
            },
        );

        Ok(ReportResponse::new())
    }
}

impl_payload_handler!(ReportHandler, ReportRequest, AuthRequirement::None);

#[derive(Clone)]
pub struct PullReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl PullReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: PullReleaseRequest,
    ) -> BscpResult<PullReleaseResponse> {
        let (release, content) =
            pull_release(&self.app_state, &request.identity, request.cfg_id).await?;

        Ok(PullReleaseResponse {
            release: Some(release),
            content,
            ..PullReleaseResponse::new()
        })
    }
}

impl_payload_handler!(PullReleaseHandler, PullReleaseRequest, AuthRequirement::None);

#[derive(Clone)]
pub struct PullConfigListHandler {
    pub app_state: Arc<AppState>,
}

impl PullConfigListHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: PullConfigListRequest,
    ) -> BscpResult<PullConfigListResponse> {
        let config_items = self
            .app_state
            .config_items
            .list(request.identity.biz_id, request.identity.app_id)
            .await?;

        Ok(PullConfigListResponse {
            config_items,
            ..PullConfigListResponse::new()
        })
    }
}

impl_payload_handler!(
    PullConfigListHandler,
    PullConfigListRequest,
    AuthRequirement::None
);
