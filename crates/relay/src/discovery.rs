//! Startup discovery of services offered by peer brokers.

use futures::future::try_join_all;
use std::sync::Arc;

use routir_core::{
    config::{BatchSettings, CacheConfig},
    traits::Processor,
    types::Role,
    Error, Result,
};
use routir_processor::{BatchProcessor, ServiceRegistry};
use routir_store::build_cache;

use crate::{
    protocol::{peer_url, AvailResponse, AVAIL_PATH},
    relay::RelayEngine,
};

/// A relay registered by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    pub peer: String,
    pub service: String,
}

async fn fetch_avail(client: &reqwest::Client, peer: &str) -> Result<AvailResponse> {
    let url = peer_url(peer, AVAIL_PATH);
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| Error::transport(format!("GET {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::transport(format!("GET {} returned {}", url, status)));
    }

    response
        .json::<AvailResponse>()
        .await
        .map_err(|e| Error::protocol_violation(format!("malformed /avail from {}: {}", peer, e)))
}

/// Register a remote relay for every search service a peer offers that is
/// not already registered locally. Relays are registered under `search` and
/// its `query` alias.
///
/// All peers are probed before anything is registered; one failing probe
/// fails discovery. Each relay gets the default batching and cache settings.
/// Peers are applied in order, so when two peers offer the same service the
/// first one wins.
pub async fn discover_services(
    registry: &Arc<ServiceRegistry>,
    client: &reqwest::Client,
    peers: &[String],
) -> Result<Vec<DiscoveredService>> {
    let listings = try_join_all(peers.iter().map(|peer| fetch_avail(client, peer))).await?;

    let mut added = Vec::new();
    for (peer, listing) in peers.iter().zip(listings) {
        for service in listing.search_services() {
            if registry.has_service(&service, Role::Search) {
                tracing::debug!(%peer, %service, "Service available locally, not relaying");
                continue;
            }

            let engine = RelayEngine::remote(&service, peer, &service)?.with_client(client.clone());
            let cache = CacheConfig::default();
            let processor: Arc<dyn Processor> = Arc::new(
                BatchProcessor::query(Arc::new(engine), BatchSettings::default())
                    .with_cache(build_cache(&cache)?, cache.key_fields),
            );
            processor.start().await?;

            if registry.register(&service, Role::Search, processor.clone()) {
                // Local relays resolve their target under `query`.
                registry.register(&service, Role::Query, processor);
                tracing::info!(%peer, %service, "Added auto relay");
                added.push(DiscoveredService {
                    peer: peer.clone(),
                    service,
                });
            } else {
                // Lost a race with another registration.
                processor.stop().await?;
            }
        }
    }

    Ok(added)
}
