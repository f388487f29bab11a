#![deny(unused)]
//! routir - request broker for retrieval and ranking services.
//!
//! Loads the broker configuration from the first argument (a file path or an
//! inline JSON document) or `ROUTIR_CONFIG`, starts every configured
//! service, imports services from peers and serves them over HTTP.

use anyhow::Context;

use routir_core::config::BrokerConfig;
use routir_gateway::{Broker, EngineFactory, GatewayConfig, GatewayServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    routir_telemetry::configure_tracing()?;

    tracing::info!("Starting routir v{}", env!("CARGO_PKG_VERSION"));

    let source = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ROUTIR_CONFIG").ok())
        .context("usage: routir <config file or JSON> (or set ROUTIR_CONFIG)")?;
    let config = BrokerConfig::load(&source)?;
    let metrics = routir_telemetry::setup_metrics_recorder()?;

    // =========================================================================
    // Services
    // =========================================================================
    let broker = Broker::from_config(config, &EngineFactory::with_builtins()).await?;
    for relay in broker.discovered() {
        tracing::info!(peer = %relay.peer, service = %relay.service, "Imported service");
    }

    // =========================================================================
    // HTTP
    // =========================================================================
    let server = GatewayServer::new(
        GatewayConfig::from(broker.config().server.clone()),
        broker.registry(),
    )
    .with_metrics(metrics);

    let served = server.run_until(shutdown_signal()).await;

    broker.shutdown().await;
    tracing::info!("routir stopped");
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
