//! Startup wiring: configured services, score processors, peer discovery.

use std::sync::Arc;

use routir_core::{
    config::{BrokerConfig, CacheConfig, ServiceConfig},
    traits::Processor,
    types::Role,
    Result,
};
use routir_processor::{BatchProcessor, ProcessorKind, ServiceRegistry};
use routir_relay::{discover_services, DiscoveredService};
use routir_store::build_cache;

use crate::factory::{BrokerContext, EngineFactory};

/// A running set of processors and the registry that names them.
pub struct Broker {
    config: BrokerConfig,
    context: BrokerContext,
    discovered: Vec<DiscoveredService>,
}

impl Broker {
    /// Build, start and register every configured service, then discover
    /// services offered by `server_imports`.
    ///
    /// Each service is registered under `search`, and under `query` so local
    /// relays can reach it. Engines that can score also get a pairwise score
    /// processor (cache off) under `score` unless `scoring_disabled` is set.
    /// A repeated service name keeps the first entry. On error, processors
    /// started so far are stopped.
    pub async fn from_config(config: BrokerConfig, factory: &EngineFactory) -> Result<Self> {
        config.validate()?;
        let context = BrokerContext::new(Arc::new(ServiceRegistry::new()));

        let mut broker = Self {
            config,
            context,
            discovered: Vec::new(),
        };
        if let Err(e) = broker.bootstrap(factory).await {
            broker.shutdown().await;
            return Err(e);
        }
        Ok(broker)
    }

    async fn bootstrap(&mut self, factory: &EngineFactory) -> Result<()> {
        for service in &self.config.services {
            self.load_service(service, factory).await?;
        }

        if !self.config.server_imports.is_empty() {
            self.discovered = discover_services(
                &self.context.registry,
                &self.context.client,
                &self.config.server_imports,
            )
            .await?;
        }

        tracing::info!(
            services = self.config.services.len(),
            discovered = self.discovered.len(),
            "Broker ready"
        );
        Ok(())
    }

    async fn load_service(&self, service: &ServiceConfig, factory: &EngineFactory) -> Result<()> {
        let registry = &self.context.registry;
        let kind = ProcessorKind::from_tag(&service.processor)?;
        let engine = factory.build(service, &self.context)?;
        // Pairwise keys would ignore `candidates`, so scoring never caches.
        let cache = match kind {
            ProcessorKind::Query => service.cache_config()?,
            ProcessorKind::PairwiseScore => CacheConfig::disabled(),
        };

        let processor: Arc<dyn Processor> = Arc::new(
            BatchProcessor::new(kind, engine.clone(), service.batch_settings()?)
                .with_cache(build_cache(&cache)?, cache.key_fields.clone()),
        );
        processor.start().await?;

        if !registry.register(&service.name, kind.role(), processor.clone()) {
            processor.stop().await?;
            tracing::warn!(service = %service.name, "Service configured twice, keeping the first");
            return Ok(());
        }
        if kind.role() == Role::Search {
            registry.register(&service.name, Role::Query, processor);
        }
        tracing::info!(
            service = %service.name,
            engine = %service.engine,
            processor = kind.tag(),
            "Loaded service"
        );

        if kind == ProcessorKind::Query && engine.can_score() && !service.scoring_disabled {
            let scorer: Arc<dyn Processor> = Arc::new(
                BatchProcessor::pairwise_score(engine, service.batch_settings()?)
                    .with_cache(build_cache(&CacheConfig::disabled())?, Vec::new()),
            );
            scorer.start().await?;
            registry.register(&service.name, Role::Score, scorer);
            tracing::info!(service = %service.name, "Loaded score service");
        }

        Ok(())
    }

    pub fn registry(&self) -> Arc<ServiceRegistry> {
        self.context.registry.clone()
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Relays added by discovery at startup.
    pub fn discovered(&self) -> &[DiscoveredService] {
        &self.discovered
    }

    /// Stop every processor, draining queued requests.
    pub async fn shutdown(&self) {
        tracing::info!("Stopping processors");
        self.context.registry.stop_all().await;
    }
}
