// Commit module gRPC handlers
// Implements handlers for commit and multi commit lifecycle requests

use std::sync::Arc;

use tracing::info;

use bscp_api::release::{
    CancelCommitRequest, CancelCommitResponse, CancelMultiCommitRequest,
    CancelMultiCommitResponse, ConfirmCommitRequest, ConfirmCommitResponse,
    ConfirmMultiCommitRequest, ConfirmMultiCommitResponse, CreateCommitRequest,
    CreateCommitResponse, CreateMultiCommitRequest, CreateMultiCommitResponse,
    QueryCommitRequest, QueryCommitResponse, QueryMultiCommitRequest, QueryMultiCommitResponse,
};
use bscp_common::BscpResult;
use bscp_core::{Connection, handler::rpc::AuthRequirement};

use crate::model::AppState;

// Handler for CreateCommitRequest - records an Init commit of one config item
#[derive(Clone)]
pub struct CreateCommitHandler {
    pub app_state: Arc<AppState>,
}

impl CreateCommitHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: CreateCommitRequest,
    ) -> BscpResult<CreateCommitResponse> {
        let id = self
            .app_state
            .commits
            .create(
                request.biz_id,
                request.app_id,
                &request.spec,
                request.request.operator(),
            )
            .await?;

        Ok(CreateCommitResponse {
            id,
            ..CreateCommitResponse::new()
        })
    }
}

impl_payload_handler!(CreateCommitHandler, CreateCommitRequest, AuthRequirement::Write);

// Handler for ConfirmCommitRequest - Init to Confirmed after the blob check
#[derive(Clone)]
pub struct ConfirmCommitHandler {
    pub app_state: Arc<AppState>,
}

impl ConfirmCommitHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: ConfirmCommitRequest,
    ) -> BscpResult<ConfirmCommitResponse> {
        let target = &request.target;
        self.app_state
            .commits
            .confirm(target.biz_id, target.commit_id, request.request.operator())
            .await?;

        Ok(ConfirmCommitResponse::new())
    }
}

impl_payload_handler!(ConfirmCommitHandler, ConfirmCommitRequest, AuthRequirement::Write);

#[derive(Clone)]
pub struct CancelCommitHandler {
    pub app_state: Arc<AppState>,
}

impl CancelCommitHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: CancelCommitRequest,
    ) -> BscpResult<CancelCommitResponse> {
        let target = &request.target;
        self.app_state
            .commits
            .cancel(target.biz_id, target.commit_id, request.request.operator())
            .await?;

        Ok(CancelCommitResponse::new())
    }
}

impl_payload_handler!(CancelCommitHandler, CancelCommitRequest, AuthRequirement::Write);

#[derive(Clone)]
pub struct QueryCommitHandler {
    pub app_state: Arc<AppState>,
}

impl QueryCommitHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: QueryCommitRequest,
    ) -> BscpResult<QueryCommitResponse> {
        let commit = self
            .app_state
            .commits
            .query(request.target.biz_id, request.target.commit_id)
            .await?;

        Ok(QueryCommitResponse {
            commit: Some(commit),
            ..QueryCommitResponse::new()
        })
    }
}

impl_payload_handler!(QueryCommitHandler, QueryCommitRequest, AuthRequirement::Read);

// Handler for CreateMultiCommitRequest - best effort over every item
#[derive(Clone)]
pub struct CreateMultiCommitHandler {
    pub app_state: Arc<AppState>,
}

impl CreateMultiCommitHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: CreateMultiCommitRequest,
    ) -> BscpResult<CreateMultiCommitResponse> {
        let (multi_commit_id, results) = self
            .app_state
            .multi_commits
            .create(
                request.biz_id,
                request.app_id,
                request.reuse_commit_id,
                &request.memo,
                &request.items,
                request.request.operator(),
            )
            .await?;

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            info!(
                biz_id = request.biz_id,
                multi_commit_id,
                failed,
                "Multi commit created with failed items"
            );
        }

        Ok(CreateMultiCommitResponse {
            multi_commit_id,
            results,
            ..CreateMultiCommitResponse::new()
        })
    }
}

impl_payload_handler!(
    CreateMultiCommitHandler,
    CreateMultiCommitRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct ConfirmMultiCommitHandler {
    pub app_state: Arc<AppState>,
}

impl ConfirmMultiCommitHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: ConfirmMultiCommitRequest,
    ) -> BscpResult<ConfirmMultiCommitResponse> {
        let target = &request.target;
        let results = self
            .app_state
            .multi_commits
            .confirm(
                target.biz_id,
                target.multi_commit_id,
                request.request.operator(),
            )
            .await?;

        Ok(ConfirmMultiCommitResponse {
            results,
            ..ConfirmMultiCommitResponse::new()
        })
    }
}

impl_payload_handler!(
    ConfirmMultiCommitHandler,
    ConfirmMultiCommitRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct CancelMultiCommitHandler {
    pub app_state: Arc<AppState>,
}

impl CancelMultiCommitHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: CancelMultiCommitRequest,
    ) -> BscpResult<CancelMultiCommitResponse> {
        let target = &request.target;
        let results = self
            .app_state
            .multi_commits
            .cancel(
                target.biz_id,
                target.multi_commit_id,
                request.request.operator(),
            )
            .await?;

        Ok(CancelMultiCommitResponse {
            results,
            ..CancelMultiCommitResponse::new()
        })
    }
}

impl_payload_handler!(
    CancelMultiCommitHandler,
    CancelMultiCommitRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct QueryMultiCommitHandler {
    pub app_state: Arc<AppState>,
}

impl QueryMultiCommitHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: QueryMultiCommitRequest,
    ) -> BscpResult<QueryMultiCommitResponse> {
        let multi_commit = self
            .app_state
            .multi_commits
            .query(request.target.biz_id, request.target.multi_commit_id)
            .await?;

        Ok(QueryMultiCommitResponse {
            multi_commit: Some(multi_commit),
            ..QueryMultiCommitResponse::new()
        })
    }
}

impl_payload_handler!(
    QueryMultiCommitHandler,
    QueryMultiCommitRequest,
    AuthRequirement::Read
);
