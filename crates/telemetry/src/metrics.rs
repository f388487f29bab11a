//! Metrics implementation using Prometheus.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use routir_core::{Error, Result};

/// Initialize Prometheus recorder and return the handle.
///
/// The handle renders every counter and histogram recorded by the cache,
/// the batch workers and relays; the gateway serves it on `/metrics`.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}
