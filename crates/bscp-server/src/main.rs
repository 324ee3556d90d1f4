//! Main entry point for the BSCP configuration release server.
//!
//! Opens the database shards, subscribes to the signalling bus and starts the
//! gRPC and HTTP admin servers until a shutdown signal arrives.

use std::sync::Arc;

use tracing::{error, info};

use bscp_core::{LoadReporter, SessionRegistry};
use bscp_persistence::ShardingRouter;
use bscp_server::{
    AppState, Configuration, metrics,
    startup::{self, GracefulShutdown, ShutdownSignal},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let logging_config = configuration.logging_config().with_env_overrides();
    let _logging_guard = startup::init_logging(&logging_config)?;

    let metrics_handle = metrics::install_recorder()?;

    // Database shards
    let router = ShardingRouter::connect(configuration.shard_connect_options()).await?;
    info!(shards = router.shard_count(), "Database shards connected");
    if configuration.auto_migrate() {
        router.migrate_all().await?;
        info!("Schema migrations applied");
    }
    let router = Arc::new(router);

    let sessions = Arc::new(SessionRegistry::new());
    let bus = startup::signalling_bus(&configuration).await?;
    let blobs = startup::blob_store(&configuration)?;

    let app_state = Arc::new(
        AppState::new(configuration, router, blobs, bus, sessions.clone())
            .with_metrics(metrics_handle),
    );
    app_state.publisher.start().await?;

    let shutdown = ShutdownSignal::new();
    startup::listen_for_os_signals(shutdown.clone());

    let configuration = &app_state.configuration;
    if let Some(endpoint) = configuration.discovery_endpoint() {
        let address = format!(
            "{}:{}",
            bscp_common::local_ip(),
            configuration.grpc_port()
        );
        let reporter = LoadReporter::new(
            endpoint,
            address,
            configuration.discovery_interval(),
            configuration.discovery_timeout(),
            sessions.clone(),
        )?;
        Arc::new(reporter).start(shutdown.subscribe());
    }

    let grpc_server = startup::start_grpc_server(app_state.clone(), shutdown.clone())?;

    info!(
        "Starting HTTP admin server on {}:{}",
        configuration.server_address(),
        configuration.http_port()
    );
    let http_server = startup::admin_server(
        app_state.clone(),
        configuration.server_address(),
        configuration.http_port(),
    )?;
    let http_handle = http_server.handle();

    let graceful_shutdown =
        GracefulShutdown::new(shutdown.clone(), configuration.shutdown_timeout(), sessions);

    tokio::select! {
        result = http_server => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
            shutdown.shutdown();
        }
        _ = graceful_shutdown.wait_for_shutdown() => {
            info!("All servers shutting down gracefully");
        }
    }

    http_handle.stop(true).await;
    if let Err(e) = grpc_server.await {
        error!("gRPC server task failed: {}", e);
    }

    info!("BSCP server shutdown complete");
    Ok(())
}
