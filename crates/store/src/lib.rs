#![deny(unused)]
//! Result caches for routir processors.
//!
//! Three backends sit behind `ResultCache`: a bounded in-memory FIFO/TTL
//! cache, a Redis cache shared across broker instances, and a bypass cache
//! used when `cache_size < 0`.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::sync::Arc;

use routir_core::{config::CacheConfig, traits::ResultCache, types::Scores, Result};

pub use self::redis::RedisCache;
pub use memory::InMemoryCache;

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

#[async_trait]
impl ResultCache for DisabledCache {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> Result<Option<Scores>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _scores: &Scores) -> Result<()> {
        Ok(())
    }
}

/// Build the cache described by `config`.
///
/// Negative sizes disable caching; a Redis URL selects the shared backend;
/// anything else is an in-memory cache.
pub fn build_cache(config: &CacheConfig) -> Result<Arc<dyn ResultCache>> {
    if !config.is_enabled() {
        tracing::debug!("Result cache disabled");
        return Ok(Arc::new(DisabledCache));
    }

    if let Some(url) = &config.redis_url {
        let mut cache = RedisCache::with_options(
            url.expose_secret(),
            &config.redis_prefix,
            &config.redis_options,
        )?;
        if let Some(ttl) = config.ttl {
            cache = cache.with_ttl(ttl);
        }
        tracing::info!(prefix = %config.redis_prefix, "Using Redis result cache");
        return Ok(Arc::new(cache));
    }

    let mut cache = InMemoryCache::new(config.size as usize);
    if let Some(ttl) = config.ttl {
        cache = cache.with_ttl(ttl);
    }
    tracing::debug!(capacity = config.size, ttl = ?config.ttl, "Using in-memory result cache");
    Ok(Arc::new(cache))
}
