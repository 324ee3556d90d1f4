//! Application startup utilities module.
//!
//! Logging, the gRPC and HTTP servers, graceful shutdown, and the choice of
//! signalling bus and blob store for this process.

mod grpc;
mod http;
mod logging;
mod shutdown;

use std::sync::Arc;

use tracing::{info, warn};

use bscp_core::{ChannelSignallingBus, SignallingBus};
use bscp_release::{BlobStore, UncheckedBlobStore};

use crate::{model::Configuration, service::blob::HttpBlobStore};

pub use grpc::{build_handler_registry, start_grpc_server};
pub use http::{admin_server, routes};
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{GracefulShutdown, ShutdownSignal, listen_for_os_signals};

/// Redis when a URL is configured and the `redis` feature is built in,
/// otherwise the in-process bus.
pub async fn signalling_bus(
    configuration: &Configuration,
) -> anyhow::Result<Arc<dyn SignallingBus>> {
    match configuration.redis_url() {
        #[cfg(feature = "redis")]
        Some(url) => {
            let topic = configuration.signalling_topic();
            let bus = bscp_core::service::RedisSignallingBus::connect(&url, &topic).await?;
            info!(topic = %topic, "Using Redis signalling bus");
            Ok(Arc::new(bus))
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            warn!("Redis URL configured but the redis feature is not built in; using in-process bus");
            Ok(Arc::new(ChannelSignallingBus::new()))
        }
        None => {
            info!("Using in-process signalling bus");
            Ok(Arc::new(ChannelSignallingBus::new()))
        }
    }
}

/// HTTP blob store when an endpoint is configured; otherwise commits are
/// confirmed without an upload check.
pub fn blob_store(configuration: &Configuration) -> anyhow::Result<Arc<dyn BlobStore>> {
    match configuration.blob_endpoint() {
        Some(endpoint) => {
            info!(endpoint = %endpoint, "Using HTTP blob store");
            Ok(Arc::new(HttpBlobStore::new(
                endpoint,
                configuration.blob_timeout(),
            )?))
        }
        None => {
            warn!("No blob store endpoint configured; commit contents are not verified");
            Ok(Arc::new(UncheckedBlobStore))
        }
    }
}
