//! Graceful shutdown handling
//!
//! One [`ShutdownSignal`] fans out to the gRPC server, the HTTP server and the
//! background tasks. On shutdown the session registry is closed so every open
//! signalling stream ends.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info};

use bscp_core::SessionRegistry;

#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(());
    }

    /// Resolves on the next shutdown; usable as a tonic shutdown future.
    pub fn notified(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut receiver = self.subscribe();
        async move {
            let _ = receiver.recv().await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut signal) => {
            signal.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}

/// Trigger `shutdown` on Ctrl+C or SIGTERM.
pub fn listen_for_os_signals(shutdown: ShutdownSignal) {
    tokio::spawn(async move {
        tokio::select! {
            _ = ctrl_c() => info!("Received Ctrl+C, initiating graceful shutdown..."),
            _ = terminate() => info!("Received SIGTERM, initiating graceful shutdown..."),
        }
        shutdown.shutdown();
    });
}

/// Coordinates the end of the process: waits for the signal, closes every
/// session, then gives in-flight requests a grace period.
pub struct GracefulShutdown {
    shutdown_signal: ShutdownSignal,
    shutdown_timeout: Duration,
    sessions: Arc<SessionRegistry>,
}

impl GracefulShutdown {
    pub fn new(
        shutdown_signal: ShutdownSignal,
        shutdown_timeout: Duration,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            shutdown_signal,
            shutdown_timeout,
            sessions,
        }
    }

    pub async fn wait_for_shutdown(&self) {
        let mut receiver = self.shutdown_signal.subscribe();
        let _ = receiver.recv().await;

        let closed = self.sessions.close_all();
        info!(
            sessions_closed = closed,
            "Shutdown initiated, waiting up to {:?} for requests to finish...",
            self.shutdown_timeout
        );

        tokio::time::sleep(self.shutdown_timeout).await;

        info!("Shutdown complete");
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.shutdown_signal.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bscp_api::conn::InstanceIdentity;
    use bscp_core::{Connection, Session};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_every_subscriber_sees_shutdown() {
        let signal = ShutdownSignal::new();
        let mut a = signal.subscribe();
        let mut b = signal.subscribe();

        signal.shutdown();

        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_notified_resolves_after_shutdown() {
        let signal = ShutdownSignal::new();
        let notified = tokio::spawn(signal.notified());

        tokio::task::yield_now().await;
        signal.shutdown();

        tokio::time::timeout(Duration::from_secs(1), notified)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_graceful_shutdown_closes_sessions() {
        let sessions = Arc::new(SessionRegistry::new());
        let (tx, _rx) = mpsc::channel(1);
        let mut connection = Connection::default();
        connection.meta_info.connection_id = "c1".to_string();
        sessions.register(Session::new(
            connection,
            InstanceIdentity::default(),
            String::new(),
            tx,
        ));

        let signal = ShutdownSignal::new();
        let graceful =
            GracefulShutdown::new(signal.clone(), Duration::from_millis(10), sessions.clone());
        let waiter = tokio::spawn(async move { graceful.wait_for_shutdown().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sessions.count(), 0);
    }
}
