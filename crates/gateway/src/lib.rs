#![deny(unused)]
//! HTTP entry point and startup wiring for routir.
//!
//! `EngineFactory` turns engine tags from the configuration into engines,
//! `Broker` builds and registers a processor per configured service, and
//! `GatewayServer` exposes the registry to clients and peer brokers.

pub mod broker;
pub mod factory;
pub mod server;

pub use broker::Broker;
pub use factory::{BrokerContext, EngineFactory};
pub use server::{GatewayConfig, GatewayServer};
