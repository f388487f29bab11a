#![deny(unused)]
//! Logging, tracing and metrics setup for the routir binary.

pub mod metrics;
pub mod tracing_layer;

pub use metrics::setup_metrics_recorder;
pub use tracing_layer::configure_tracing;
