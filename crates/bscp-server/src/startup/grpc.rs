//! gRPC server setup and handler registration module.

use std::sync::Arc;

use tonic::service::InterceptorLayer;
use tower::ServiceBuilder;
use tracing::{error, info};

use bscp_api::grpc::{
    bi_request_stream_server::BiRequestStreamServer, request_server::RequestServer,
};
use bscp_core::{
    context_interceptor,
    handler::{
        generic::{HealthCheckHandler, ServerCheckHandler},
        rpc::{GrpcBiRequestStreamService, GrpcRequestService, HandlerRegistry},
    },
};

use crate::{
    model::AppState,
    service::{
        commit_handler::{
            CancelCommitHandler, CancelMultiCommitHandler, ConfirmCommitHandler,
            ConfirmMultiCommitHandler, CreateCommitHandler, CreateMultiCommitHandler,
            QueryCommitHandler, QueryMultiCommitHandler,
        },
        conn_handler::{AccessHandler, PullConfigListHandler, PullReleaseHandler, ReportHandler},
        release_handler::{
            CancelMultiReleaseHandler, CancelReleaseHandler, CreateConfigItemHandler,
            CreateMultiReleaseHandler, CreateReleaseHandler, CreateStrategyHandler,
            ListConfigItemsHandler, PublishMultiReleaseHandler, PublishReleaseHandler,
            QueryConfigItemHandler, QueryMultiReleaseHandler, QueryNewestReleasesHandler,
            QueryReleaseHandler, QueryStrategyHandler, ReloadHandler, RollbackReleaseHandler,
        },
        tunnel_handler::{
            TunnelPublishReleaseHandler, TunnelPullReleaseHandler, TunnelReloadHandler,
            TunnelRollbackReleaseHandler,
        },
    },
    startup::ShutdownSignal,
};

/// Register every request type this server answers.
pub fn build_handler_registry(app_state: Arc<AppState>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::with_auth(app_state.configuration.auth_service());

    // Internal handlers
    registry.register_handler(Arc::new(HealthCheckHandler {}));
    registry.register_handler(Arc::new(ServerCheckHandler {}));

    // Commit handlers
    registry.register_handler(Arc::new(CreateCommitHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(ConfirmCommitHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(CancelCommitHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(QueryCommitHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(CreateMultiCommitHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(ConfirmMultiCommitHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(CancelMultiCommitHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(QueryMultiCommitHandler {
        app_state: app_state.clone(),
    }));

    // Release handlers
    registry.register_handler(Arc::new(CreateReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(CancelReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(PublishReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(RollbackReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(ReloadHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(QueryReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(QueryNewestReleasesHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(CreateMultiReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(PublishMultiReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(CancelMultiReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(QueryMultiReleaseHandler {
        app_state: app_state.clone(),
    }));

    // Strategy and config item handlers
    registry.register_handler(Arc::new(CreateStrategyHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(QueryStrategyHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(CreateConfigItemHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(QueryConfigItemHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(ListConfigItemsHandler {
        app_state: app_state.clone(),
    }));

    // Sidecar handlers
    registry.register_handler(Arc::new(AccessHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(ReportHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(PullReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(PullConfigListHandler {
        app_state: app_state.clone(),
    }));

    // Tunnel handlers
    registry.register_handler(Arc::new(TunnelPublishReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(TunnelReloadHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(TunnelRollbackReleaseHandler {
        app_state: app_state.clone(),
    }));
    registry.register_handler(Arc::new(TunnelPullReleaseHandler { app_state }));

    registry
}

/// Start the gRPC server carrying both the unary and the signalling stream
/// services. It stops accepting work once `shutdown` fires.
pub fn start_grpc_server(
    app_state: Arc<AppState>,
    shutdown: ShutdownSignal,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let configuration = &app_state.configuration;
    let addr = format!(
        "{}:{}",
        configuration.server_address(),
        configuration.grpc_port()
    )
    .parse()?;
    let push_buffer = configuration.push_buffer();
    let sessions = app_state.sessions.clone();

    let registry = Arc::new(build_handler_registry(app_state));
    info!(
        handlers = registry.registered_message_types().len(),
        "gRPC handlers registered"
    );

    let layer = ServiceBuilder::new()
        .layer(InterceptorLayer::new(context_interceptor))
        .into_inner();
    let request_service = GrpcRequestService::from_arc(registry.clone());
    let stream_service = GrpcBiRequestStreamService::from_arc(registry, sessions, push_buffer);

    info!("Starting gRPC server on {}", addr);
    Ok(tokio::spawn(async move {
        let result = tonic::transport::Server::builder()
            .layer(layer)
            .add_service(RequestServer::new(request_service))
            .add_service(BiRequestStreamServer::new(stream_service))
            .serve_with_shutdown(addr, shutdown.notified())
            .await;
        if let Err(e) = result {
            error!("gRPC server error: {}", e);
        }
    }))
}
