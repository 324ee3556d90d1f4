// Periodic session-count reporting to a discovery endpoint

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use bscp_common::{BscpError, BscpResult};

use super::remote::SessionRegistry;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub address: String,
    pub connections: usize,
}

pub struct LoadReporter {
    client: reqwest::Client,
    endpoint: String,
    address: String,
    interval: Duration,
    sessions: Arc<SessionRegistry>,
}

impl LoadReporter {
    pub fn new(
        endpoint: String,
        address: String,
        interval: Duration,
        timeout: Duration,
        sessions: Arc<SessionRegistry>,
    ) -> BscpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BscpError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            address,
            interval,
            sessions,
        })
    }

    pub fn current(&self) -> LoadReport {
        LoadReport {
            address: self.address.clone(),
            connections: self.sessions.count(),
        }
    }

    pub async fn report_once(&self) -> BscpResult<()> {
        let report = self.current();
        let response = self
            .client
            .put(&self.endpoint)
            .json(&report)
            .send()
            .await
            .map_err(|e| BscpError::DownstreamError(format!("load report: {}", e)))?;

        if !response.status().is_success() {
            return Err(BscpError::DownstreamError(format!(
                "load report rejected with status {}",
                response.status()
            )));
        }

        debug!(connections = report.connections, "Load reported");
        Ok(())
    }

    /// Report on every tick until shutdown is signalled.
    pub fn start(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(endpoint = %self.endpoint, interval = ?self.interval, "Load reporter started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.report_once().await {
                            warn!(error = %e, "Load report failed");
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("Load reporter stopped");
                        break;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_reflects_registry() {
        let sessions = Arc::new(SessionRegistry::new());
        let reporter = LoadReporter::new(
            "http://127.0.0.1:1/load".to_string(),
            "10.0.0.9:9510".to_string(),
            Duration::from_secs(30),
            Duration::from_millis(200),
            sessions,
        )
        .unwrap();

        let report = reporter.current();
        assert_eq!(report.connections, 0);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["address"], "10.0.0.9:9510");
        assert_eq!(json["connections"], 0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_downstream_error() {
        let reporter = LoadReporter::new(
            "http://127.0.0.1:1/load".to_string(),
            "local".to_string(),
            Duration::from_secs(30),
            Duration::from_millis(200),
            Arc::new(SessionRegistry::new()),
        )
        .unwrap();

        let err = reporter.report_once().await.unwrap_err();
        assert!(matches!(err, BscpError::DownstreamError(_)));
    }
}
