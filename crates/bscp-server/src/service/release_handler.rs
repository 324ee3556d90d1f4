// Release module gRPC handlers
// Implements handlers for releases, multi releases, strategies and config items.
// Publish, rollback and reload broadcast a Signalling once the store call
// succeeded.

use std::sync::Arc;

use tracing::{info, warn};

use bscp_api::{
    EffectInfo, Publishing, ReleaseInfo, ReloadSpec, Signalling, SignallingType,
    release::{
        CancelMultiReleaseRequest, CancelMultiReleaseResponse, CancelReleaseRequest,
        CancelReleaseResponse, CreateConfigItemRequest, CreateConfigItemResponse,
        CreateMultiReleaseRequest, CreateMultiReleaseResponse, CreateReleaseRequest,
        CreateReleaseResponse, CreateStrategyRequest, CreateStrategyResponse,
        ListConfigItemsRequest, ListConfigItemsResponse, PublishMultiReleaseRequest,
        PublishMultiReleaseResponse, PublishReleaseRequest, PublishReleaseResponse,
        QueryConfigItemRequest, QueryConfigItemResponse, QueryMultiReleaseRequest,
        QueryMultiReleaseResponse, QueryNewestReleasesRequest, QueryNewestReleasesResponse,
        QueryReleaseRequest, QueryReleaseResponse, QueryStrategyRequest, QueryStrategyResponse,
        ReloadRequest, ReloadResponse, RollbackReleaseRequest, RollbackReleaseResponse,
    },
};
use bscp_common::BscpResult;
use bscp_core::{Connection, handler::rpc::AuthRequirement};

use crate::model::AppState;

/// Envelope broadcast for one release.
pub fn signalling_for(
    signalling_type: SignallingType,
    release: &ReleaseInfo,
    reload_spec: Option<ReloadSpec>,
    niceness: u64,
) -> Signalling {
    Signalling {
        signalling_type,
        publishing: Publishing {
            biz_id: release.biz_id,
            app_id: release.app_id,
            cfg_id: release.cfg_id,
            release_id: release.id,
            strategies: release.strategies.clone(),
            reload_spec,
            niceness,
        },
    }
}

/// Publish a release and broadcast it.
///
/// A bus failure is returned to the caller; publishing again is idempotent
/// and re-broadcasts.
pub async fn publish_release(
    app_state: &AppState,
    biz_id: i64,
    release_id: i64,
    niceness: u64,
    operator: &str,
) -> BscpResult<()> {
    let release = app_state.releases.publish(biz_id, release_id, operator).await?;
    app_state
        .publisher
        .publish(signalling_for(SignallingType::Publish, &release, None, niceness))
        .await
}

pub async fn rollback_release(
    app_state: &AppState,
    biz_id: i64,
    release_id: i64,
    niceness: u64,
    operator: &str,
) -> BscpResult<()> {
    let release = app_state
        .releases
        .rollback(biz_id, release_id, operator)
        .await?;
    app_state
        .publisher
        .publish(signalling_for(SignallingType::Rollback, &release, None, niceness))
        .await
}

/// Ask sidecars to reload a Published release. No state changes; an empty
/// effect list defaults to the release itself.
pub async fn reload_release(
    app_state: &AppState,
    biz_id: i64,
    release_id: i64,
    mut reload_spec: ReloadSpec,
    niceness: u64,
) -> BscpResult<()> {
    let release = app_state.releases.reload_target(biz_id, release_id).await?;
    if reload_spec.info.is_empty() {
        reload_spec.info.push(EffectInfo {
            cfg_id: release.cfg_id,
            release_id: release.id,
        });
    }

    info!(biz_id, release_id, rollback = reload_spec.rollback, "Reload requested");
    app_state
        .publisher
        .publish(signalling_for(
            SignallingType::Reload,
            &release,
            Some(reload_spec),
            niceness,
        ))
        .await
}

// ---------------------------------------------------------------------------
// Releases
// ---------------------------------------------------------------------------

// Handler for CreateReleaseRequest - snapshots the commit and strategy
#[derive(Clone)]
pub struct CreateReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl CreateReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: CreateReleaseRequest,
    ) -> BscpResult<CreateReleaseResponse> {
        let id = self
            .app_state
            .releases
            .create(
                request.biz_id,
                request.app_id,
                request.commit_id,
                request.strategy_id,
                &request.name,
                &request.memo,
                request.request.operator(),
            )
            .await?;

        Ok(CreateReleaseResponse {
            id,
            ..CreateReleaseResponse::new()
        })
    }
}

impl_payload_handler!(CreateReleaseHandler, CreateReleaseRequest, AuthRequirement::Write);

#[derive(Clone)]
pub struct CancelReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl CancelReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: CancelReleaseRequest,
    ) -> BscpResult<CancelReleaseResponse> {
        let target = &request.target;
        self.app_state
            .releases
            .cancel(target.biz_id, target.release_id, request.request.operator())
            .await?;

        Ok(CancelReleaseResponse::new())
    }
}

impl_payload_handler!(CancelReleaseHandler, CancelReleaseRequest, AuthRequirement::Write);

// Handler for PublishReleaseRequest - atomic publish, then a Publish signalling
#[derive(Clone)]
pub struct PublishReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl PublishReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: PublishReleaseRequest,
    ) -> BscpResult<PublishReleaseResponse> {
        publish_release(
            &self.app_state,
            request.target.biz_id,
            request.target.release_id,
            request.niceness,
            request.request.operator(),
        )
        .await?;

        Ok(PublishReleaseResponse::new())
    }
}

impl_payload_handler!(
    PublishReleaseHandler,
    PublishReleaseRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct RollbackReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl RollbackReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: RollbackReleaseRequest,
    ) -> BscpResult<RollbackReleaseResponse> {
        rollback_release(
            &self.app_state,
            request.target.biz_id,
            request.target.release_id,
            request.niceness,
            request.request.operator(),
        )
        .await?;

        Ok(RollbackReleaseResponse::new())
    }
}

impl_payload_handler!(
    RollbackReleaseHandler,
    RollbackReleaseRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct ReloadHandler {
    pub app_state: Arc<AppState>,
}

impl ReloadHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: ReloadRequest,
    ) -> BscpResult<ReloadResponse> {
        reload_release(
            &self.app_state,
            request.target.biz_id,
            request.target.release_id,
            request.reload_spec,
            request.niceness,
        )
        .await?;

        Ok(ReloadResponse::new())
    }
}

impl_payload_handler!(ReloadHandler, ReloadRequest, AuthRequirement::Write);

#[derive(Clone)]
pub struct QueryReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl QueryReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: QueryReleaseRequest,
    ) -> BscpResult<QueryReleaseResponse> {
        let release = self
            .app_state
            .releases
            .query(request.target.biz_id, request.target.release_id)
            .await?;

        Ok(QueryReleaseResponse {
            release: Some(release),
            ..QueryReleaseResponse::new()
        })
    }
}

impl_payload_handler!(QueryReleaseHandler, QueryReleaseRequest, AuthRequirement::Read);

// Handler for QueryNewestReleasesRequest - Published releases, newest id first
#[derive(Clone)]
pub struct QueryNewestReleasesHandler {
    pub app_state: Arc<AppState>,
}

impl QueryNewestReleasesHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: QueryNewestReleasesRequest,
    ) -> BscpResult<QueryNewestReleasesResponse> {
        let page = self
            .app_state
            .releases
            .query_newest(
                request.biz_id,
                request.cfg_id,
                request.page_number,
                request.page_size,
            )
            .await?;

        Ok(QueryNewestReleasesResponse {
            total_count: page.total_count,
            page_number: page.page_number,
            pages_available: page.pages_available,
            releases: page.page_items,
            ..QueryNewestReleasesResponse::new()
        })
    }
}

impl_payload_handler!(
    QueryNewestReleasesHandler,
    QueryNewestReleasesRequest,
    AuthRequirement::Read
);

// ---------------------------------------------------------------------------
// Multi releases
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CreateMultiReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl CreateMultiReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: CreateMultiReleaseRequest,
    ) -> BscpResult<CreateMultiReleaseResponse> {
        let (multi_release_id, results) = self
            .app_state
            .multi_releases
            .create(
                request.biz_id,
                request.app_id,
                request.multi_commit_id,
                request.strategy_id,
                &request.name,
                &request.memo,
                request.request.operator(),
            )
            .await?;

        Ok(CreateMultiReleaseResponse {
            multi_release_id,
            results,
            ..CreateMultiReleaseResponse::new()
        })
    }
}

impl_payload_handler!(
    CreateMultiReleaseHandler,
    CreateMultiReleaseRequest,
    AuthRequirement::Write
);

// Handler for PublishMultiReleaseRequest - one transaction, one signalling per member
#[derive(Clone)]
pub struct PublishMultiReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl PublishMultiReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: PublishMultiReleaseRequest,
    ) -> BscpResult<PublishMultiReleaseResponse> {
        let target = &request.target;
        let published = self
            .app_state
            .multi_releases
            .publish(
                target.biz_id,
                target.multi_release_id,
                request.request.operator(),
            )
            .await?;

        for release in &published {
            if let Err(e) = self
                .app_state
                .publisher
                .publish(signalling_for(
                    SignallingType::Publish,
                    release,
                    None,
                    request.niceness,
                ))
                .await
            {
                warn!(
                    multi_release_id = target.multi_release_id,
                    release_id = release.id,
                    error = %e,
                    "Failed to broadcast member release"
                );
                return Err(e);
            }
        }

        Ok(PublishMultiReleaseResponse::new())
    }
}

impl_payload_handler!(
    PublishMultiReleaseHandler,
    PublishMultiReleaseRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct CancelMultiReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl CancelMultiReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: CancelMultiReleaseRequest,
    ) -> BscpResult<CancelMultiReleaseResponse> {
        let target = &request.target;
        self.app_state
            .multi_releases
            .cancel(
                target.biz_id,
                target.multi_release_id,
                request.request.operator(),
            )
            .await?;

        Ok(CancelMultiReleaseResponse::new())
    }
}

impl_payload_handler!(
    CancelMultiReleaseHandler,
    CancelMultiReleaseRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct QueryMultiReleaseHandler {
    pub app_state: Arc<AppState>,
}

impl QueryMultiReleaseHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: QueryMultiReleaseRequest,
    ) -> BscpResult<QueryMultiReleaseResponse> {
        let multi_release = self
            .app_state
            .multi_releases
            .query(request.target.biz_id, request.target.multi_release_id)
            .await?;

        Ok(QueryMultiReleaseResponse {
            multi_release: Some(multi_release),
            ..QueryMultiReleaseResponse::new()
        })
    }
}

impl_payload_handler!(
    QueryMultiReleaseHandler,
    QueryMultiReleaseRequest,
    AuthRequirement::Read
);

// ---------------------------------------------------------------------------
// Strategies and config items
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CreateStrategyHandler {
    pub app_state: Arc<AppState>,
}

impl CreateStrategyHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: CreateStrategyRequest,
    ) -> BscpResult<CreateStrategyResponse> {
        let id = self
            .app_state
            .strategies
            .create(
                request.biz_id,
                request.app_id,
                &request.name,
                &request.content,
                &request.memo,
                request.request.operator(),
            )
            .await?;

        Ok(CreateStrategyResponse {
            id,
            ..CreateStrategyResponse::new()
        })
    }
}

impl_payload_handler!(
    CreateStrategyHandler,
    CreateStrategyRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct QueryStrategyHandler {
    pub app_state: Arc<AppState>,
}

impl QueryStrategyHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: QueryStrategyRequest,
    ) -> BscpResult<QueryStrategyResponse> {
        let strategy = self
            .app_state
            .strategies
            .query(request.biz_id, request.strategy_id)
            .await?;

        Ok(QueryStrategyResponse {
            strategy: Some(strategy),
            ..QueryStrategyResponse::new()
        })
    }
}

impl_payload_handler!(QueryStrategyHandler, QueryStrategyRequest, AuthRequirement::Read);

#[derive(Clone)]
pub struct CreateConfigItemHandler {
    pub app_state: Arc<AppState>,
}

impl CreateConfigItemHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: CreateConfigItemRequest,
    ) -> BscpResult<CreateConfigItemResponse> {
        let id = self
            .app_state
            .config_items
            .create(
                request.biz_id,
                request.app_id,
                &request.name,
                &request.path,
                &request.file_type,
                &request.memo,
                request.request.operator(),
            )
            .await?;

        Ok(CreateConfigItemResponse {
            id,
            ..CreateConfigItemResponse::new()
        })
    }
}

impl_payload_handler!(
    CreateConfigItemHandler,
    CreateConfigItemRequest,
    AuthRequirement::Write
);

#[derive(Clone)]
pub struct QueryConfigItemHandler {
    pub app_state: Arc<AppState>,
}

impl QueryConfigItemHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: QueryConfigItemRequest,
    ) -> BscpResult<QueryConfigItemResponse> {
        let config_item = self
            .app_state
            .config_items
            .query(request.biz_id, request.config_item_id)
            .await?;

        Ok(QueryConfigItemResponse {
            config_item: Some(config_item),
            ..QueryConfigItemResponse::new()
        })
    }
}

impl_payload_handler!(
    QueryConfigItemHandler,
    QueryConfigItemRequest,
    AuthRequirement::Read
);

#[derive(Clone)]
pub struct ListConfigItemsHandler {
    pub app_state: Arc<AppState>,
}

impl ListConfigItemsHandler {
    async fn execute(
        &self,
        _connection: &Connection,
        request: ListConfigItemsRequest,
    ) -> BscpResult<ListConfigItemsResponse> {
        let config_items = self
            .app_state
            .config_items
            .list(request.biz_id, request.app_id)
            .await?;

        Ok(ListConfigItemsResponse {
            config_items,
            ..ListConfigItemsResponse::new()
        })
    }
}

impl_payload_handler!(
    ListConfigItemsHandler,
    ListConfigItemsRequest,
    AuthRequirement::Read
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signalling_for_copies_release_targeting() {
        let release = ReleaseInfo {
            id: 9,
            biz_id: 1,
            app_id: 2,
            cfg_id: 3,
            strategies: r#"{"labelsOr":[{"env":"prod"}]}"#.to_string(),
            ..Default::default()
        };

        let signalling = signalling_for(SignallingType::Rollback, &release, None, 50);

        assert_eq!(signalling.signalling_type, SignallingType::Rollback);
        assert_eq!(signalling.publishing.release_id, 9);
        assert_eq!(signalling.publishing.cfg_id, 3);
        assert_eq!(signalling.publishing.strategies, release.strategies);
        assert_eq!(signalling.publishing.niceness, 50);
        assert!(signalling.publishing.reload_spec.is_none());
    }
}
