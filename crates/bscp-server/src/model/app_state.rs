//! Shared state handed to every gRPC handler and HTTP route.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use bscp_core::{SessionRegistry, SignallingBus};
use bscp_persistence::ShardingRouter;
use bscp_release::{
    BlobStore, CommitStore, ConfigItemStore, MultiCommitStore, MultiReleaseStore, PublishManager,
    ReleaseStore, StoreContext, StrategyStore,
};

use super::config::Configuration;

pub struct AppState {
    pub configuration: Configuration,
    pub router: Arc<ShardingRouter>,
    pub commits: CommitStore,
    pub multi_commits: MultiCommitStore,
    pub releases: ReleaseStore,
    pub multi_releases: MultiReleaseStore,
    pub strategies: StrategyStore,
    pub config_items: ConfigItemStore,
    pub publisher: Arc<PublishManager>,
    pub sessions: Arc<SessionRegistry>,
    /// Renders `/metrics`; absent when no recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire every store onto one router. The publish manager is created but
    /// not subscribed; call [`PublishManager::start`] once the bus is ready.
    pub fn new(
        configuration: Configuration,
        router: Arc<ShardingRouter>,
        blobs: Arc<dyn BlobStore>,
        bus: Arc<dyn SignallingBus>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        let ctx = StoreContext::new(router.clone(), configuration.db_timeout());
        let commits = CommitStore::new(ctx.clone(), blobs);

        Self {
            multi_commits: MultiCommitStore::new(ctx.clone(), commits.clone()),
            commits,
            releases: ReleaseStore::new(ctx.clone()),
            multi_releases: MultiReleaseStore::new(ctx.clone()),
            strategies: StrategyStore::new(ctx.clone()),
            config_items: ConfigItemStore::new(ctx),
            publisher: Arc::new(PublishManager::new(bus, sessions.clone())),
            sessions,
            router,
            configuration,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("configuration", &self.configuration)
            .field("shards", &self.router.shard_count())
            .field("sessions", &self.sessions.count())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
