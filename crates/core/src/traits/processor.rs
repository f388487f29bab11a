//! Processor trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Request, Response};

/// Broker-side front of an engine, addressed through the service registry.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Service name this processor serves.
    fn name(&self) -> &str;

    /// Whether submissions are currently accepted.
    fn is_running(&self) -> bool;

    /// Launch background work. Fails if the processor is not stopped.
    async fn start(&self) -> Result<()>;

    /// Stop accepting submissions and drain queued work.
    async fn stop(&self) -> Result<()>;

    /// Submit one request and wait for its individual result.
    async fn submit(&self, request: Request) -> Result<Response>;
}
