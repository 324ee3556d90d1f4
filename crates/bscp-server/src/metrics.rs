// Metrics module for observability
// Installs the Prometheus recorder and describes every metric the pipeline emits

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global recorder and return the handle `/metrics` renders from.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

/// Describe every metric once at start-up.
pub fn describe_metrics() {
    // gRPC
    describe_histogram!(
        "bscp_rpc_duration_seconds",
        "Duration of unary and stream RPC handling in seconds, by request type"
    );

    // Sessions
    describe_gauge!("bscp_sessions_open", "Number of open signalling sessions");
    describe_counter!(
        "bscp_push_dropped_total",
        "Pushes dropped because a session's queue was full"
    );

    // Signalling
    describe_counter!(
        "bscp_signalling_published_total",
        "Signalling envelopes handed to the bus, by type"
    );
    describe_counter!(
        "bscp_signalling_pushed_total",
        "Notify frames queued on sessions"
    );

    // Releases
    describe_counter!("bscp_release_published_total", "Releases published");
    describe_counter!("bscp_commit_confirmed_total", "Commits confirmed");

    // Storage
    describe_counter!(
        "bscp_db_timeouts_total",
        "Database round-trips that exceeded the per-call timeout"
    );

    tracing::info!("Metrics initialized");
}
