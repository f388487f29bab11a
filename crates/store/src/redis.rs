//! Redis-backed result cache shared between broker instances.

use async_trait::async_trait;
use redis::{AsyncCommands, Client, IntoConnectionInfo};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use std::time::Duration;

use routir_core::{config::RedisOptions, traits::ResultCache, types::Scores, Error, Result};

/// Result cache stored in Redis.
///
/// Entries expire server-side through `SET .. EX`; size bounding is left to
/// the server's `maxmemory` eviction policy. No local copy is kept.
pub struct RedisCache {
    client: Client,
    prefix: String,
    ttl: Option<Duration>,
}

impl RedisCache {
    /// Create a new Redis cache. Connections are opened lazily.
    pub fn new(url: &str, prefix: &str) -> Result<Self> {
        Self::with_options(url, prefix, &RedisOptions::default())
    }

    /// Like `new`, with `options` overriding what the URL says.
    pub fn with_options(url: &str, prefix: &str, options: &RedisOptions) -> Result<Self> {
        let mut info = url
            .into_connection_info()
            .map_err(|e| Error::cache(format!("Invalid Redis URL: {}", e)))?;
        if let Some(db) = options.db {
            info.redis.db = db;
        }
        if let Some(username) = &options.username {
            info.redis.username = Some(username.clone());
        }
        if let Some(password) = &options.password {
            info.redis.password = Some(password.expose_secret().clone());
        }

        let client = Client::open(info)
            .map_err(|e| Error::cache(format!("Failed to open Redis client: {}", e)))?;

        Ok(Self {
            client,
            prefix: prefix.to_string(),
            ttl: None,
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Cache keys can be long JSON arrays, so they are hashed.
    fn key(&self, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{}:{:x}", self.prefix, hasher.finalize())
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::cache(format!("Redis connection error: {}", e)))
    }
}

#[async_trait]
impl ResultCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Scores>> {
        let mut conn = self.connection().await?;

        let data: Option<String> = conn
            .get(self.key(key))
            .await
            .map_err(|e| Error::cache(format!("Redis get error: {}", e)))?;

        match data {
            Some(json) => {
                let scores = serde_json::from_str(&json)
                    .map_err(|e| Error::cache(format!("Failed to deserialize scores: {}", e)))?;
                Ok(Some(scores))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, scores: &Scores) -> Result<()> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(scores)?;
        let redis_key = self.key(key);

        match self.ttl {
            // Redis rejects EX 0, sub-second TTLs round up.
            Some(ttl) => {
                let secs = ttl.as_secs_f64().ceil().max(1.0) as u64;
                let _: () = conn
                    .set_ex(&redis_key, json, secs)
                    .await
                    .map_err(|e| Error::cache(format!("Redis set error: {}", e)))?;
            }
            None => {
                let _: () = conn
                    .set(&redis_key, json)
                    .await
                    .map_err(|e| Error::cache(format!("Redis set error: {}", e)))?;
            }
        }

        Ok(())
    }
}
