// Tunnel gRPC handlers
// Same semantics as the direct publish, reload, rollback and pull calls, for
// callers that reach a connection server over the unary transport only.

use std::sync::Arc;

use bscp_api::conn::{
    TunnelPublishReleaseRequest, TunnelPublishReleaseResponse, TunnelPullReleaseRequest,
    TunnelPullReleaseResponse, TunnelReloadRequest, TunnelReloadResponse,
    TunnelRollbackReleaseRequest, TunnelRollbackReleaseResponse,
};
use bscp_common::BscpResult;
use bscp_core::{Connection, handler::rpc::AuthRequirement};

use crate::{
    model::AppState,
    service::{
        conn_handler::pull_release,
        release_handler::{publish_release, reload_release, rollback_release},
    },
};

#[derive(Clone)]
pub struct TunnelPublishReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl TunnelPublishReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: TunnelPublishReleaseRequest,
    ) -> BscpResult<TunnelPublishReleaseResponse> {
        publish_release(
            &self.app_state,
            request.target.biz_id,
            request.target.release_id,
            request.niceness,
            request.request.operator(),
        )
        .await?;

        Ok(TunnelPublishReleaseResponse::new())
    }
}

impl_payload_handler!(
    TunnelPublishReleaseHandler,
    TunnelPublishReleaseRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct TunnelReloadHandler {
    pub app_state: Arc<AppState>,
}

impl TunnelReloadHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: TunnelReloadRequest,
    ) -> BscpResult<TunnelReloadResponse> {
        reload_release(
            &self.app_state,
            request.target.biz_id,
            request.target.release_id,
            request.reload_spec,
            request.niceness,
        )
        .await?;

        Ok(TunnelReloadResponse::new())
    }
}

impl_payload_handler!(TunnelReloadHandler, TunnelReloadRequest, AuthRequirement::Write);

#[derive(Clone)]
pub struct TunnelRollbackReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl TunnelRollbackReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: TunnelRollbackReleaseRequest,
    ) -> BscpResult<TunnelRollbackReleaseResponse> {
        rollback_release(
            &self.app_state,
            request.target.biz_id,
            request.target.release_id,
            request.niceness,
            request.request.operator(),
        )
        .await?;

        Ok(TunnelRollbackReleaseResponse::new())
    }
}

impl_payload_handler!(
    TunnelRollbackReleaseHandler,
    TunnelRollbackReleaseRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct TunnelPullReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl TunnelPullReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: TunnelPullReleaseRequest,
    ) -> BscpResult<TunnelPullReleaseResponse> {
        let (release, content) =
            pull_release(&self.app_state, &request.identity, request.cfg_id).await?;

        Ok(TunnelPullReleaseResponse {
            release: Some(release),
            content,
            ..TunnelPullReleaseResponse::new()
        })
    }
}

impl_payload_handler!(
    TunnelPullReleaseHandler,
    TunnelPullReleaseRequest,
    AuthRequirement::None
);
