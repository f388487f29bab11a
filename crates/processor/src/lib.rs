#![deny(unused)]
//! Request brokering for routir.
//!
//! This crate turns individual submissions into engine batches
//! (`BatchProcessor`) and keeps the process-wide directory of processors
//! (`ServiceRegistry`).

pub mod batch;
pub mod registry;

pub use batch::{BatchProcessor, ProcessorKind};
pub use registry::ServiceRegistry;
