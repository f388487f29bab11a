#![deny(unused)]
//! Relay engine and peer discovery for routir.
//!
//! A relay does not score anything itself: it forwards each query either to
//! a peer broker over HTTP or to another processor registered in the same
//! process. Discovery asks peers what they serve and registers a relay for
//! every service not already known locally.

pub mod discovery;
pub mod protocol;
pub mod relay;

pub use discovery::{discover_services, DiscoveredService};
pub use protocol::AvailResponse;
pub use relay::{RelayConfig, RelayEngine};
