//! Engine constructors keyed by the `engine` tag of a service entry.

use std::collections::HashMap;
use std::sync::Arc;

use routir_core::{config::ServiceConfig, traits::Engine, Error, Result};
use routir_processor::ServiceRegistry;
use routir_relay::RelayEngine;

/// Shared handles available to engine constructors.
#[derive(Clone)]
pub struct BrokerContext {
    pub registry: Arc<ServiceRegistry>,
    pub client: reqwest::Client,
}

impl BrokerContext {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            client: reqwest::Client::new(),
        }
    }
}

pub type EngineConstructor =
    Arc<dyn Fn(&ServiceConfig, &BrokerContext) -> Result<Arc<dyn Engine>> + Send + Sync>;

/// Tag table replacing dynamic engine lookup.
///
/// Only `Relay` ships built in; deployments register their own engines
/// before building the broker.
#[derive(Clone, Default)]
pub struct EngineFactory {
    constructors: HashMap<String, EngineConstructor>,
}

impl EngineFactory {
    /// Empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with the built-in engines registered.
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        factory.register("Relay", |service, ctx| {
            let engine = RelayEngine::from_config(&service.name, &service.config, ctx.registry.clone())?
                .with_client(ctx.client.clone());
            Ok(Arc::new(engine))
        });
        factory
    }

    /// Register `tag`, replacing any previous constructor for it.
    pub fn register<F>(&mut self, tag: &str, constructor: F) -> &mut Self
    where
        F: Fn(&ServiceConfig, &BrokerContext) -> Result<Arc<dyn Engine>> + Send + Sync + 'static,
    {
        if self
            .constructors
            .insert(tag.to_string(), Arc::new(constructor))
            .is_some()
        {
            tracing::debug!(tag = %tag, "Replaced engine constructor");
        }
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.constructors.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Build the engine for `service`.
    pub fn build(&self, service: &ServiceConfig, ctx: &BrokerContext) -> Result<Arc<dyn Engine>> {
        let constructor = self.constructors.get(&service.engine).ok_or_else(|| {
            Error::config(format!(
                "service `{}` uses unknown engine `{}` (known: {})",
                service.name,
                service.engine,
                self.tags().join(", ")
            ))
        })?;
        constructor(service, ctx)
    }
}
