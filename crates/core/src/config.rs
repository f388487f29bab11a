//! Broker configuration.
//!
//! Loaded with the `config` crate from a file path or an inline JSON document,
//! then overridden from `ROUTIR__*` environment variables
//! (`ROUTIR__SERVER__PORT=5001` sets `server.port`).

use config::{Config, Environment, File, FileFormat};
use secrecy::Secret;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Processor tag used when a service does not name one.
pub const DEFAULT_PROCESSOR: &str = "QueryProcessor";

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    /// Peer broker base URLs probed for services at startup.
    #[serde(default)]
    pub server_imports: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// One locally served service.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    /// Engine factory tag.
    pub engine: String,
    /// Processor tag.
    #[serde(default = "default_processor")]
    pub processor: String,
    /// Engine-specific settings, passed to the engine constructor as is.
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds.
    #[serde(default = "default_max_wait_time")]
    pub max_wait_time: f64,
    /// Maximum cache entries; negative disables caching.
    #[serde(default = "default_cache_size")]
    pub cache: i64,
    /// Seconds.
    #[serde(default)]
    pub cache_ttl: Option<f64>,
    #[serde(default = "default_cache_key_fields")]
    pub cache_key_fields: Vec<String>,
    #[serde(default)]
    pub cache_redis_url: Option<Secret<String>>,
    #[serde(default)]
    pub cache_redis_prefix: Option<String>,
    /// Connection options applied on top of `cache_redis_url`.
    #[serde(default)]
    pub cache_redis_kwargs: RedisOptions,
    #[serde(default)]
    pub scoring_disabled: bool,
}

/// Redis connection settings that are awkward to put in a URL.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisOptions {
    #[serde(default)]
    pub db: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret<String>>,
}

impl ServiceConfig {
    /// Minimal service entry with defaults everywhere else.
    pub fn new(name: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: engine.into(),
            processor: default_processor(),
            config: Map::new(),
            batch_size: default_batch_size(),
            max_wait_time: default_max_wait_time(),
            cache: default_cache_size(),
            cache_ttl: None,
            cache_key_fields: default_cache_key_fields(),
            cache_redis_url: None,
            cache_redis_prefix: None,
            cache_redis_kwargs: RedisOptions::default(),
            scoring_disabled: false,
        }
    }

    pub fn batch_settings(&self) -> Result<BatchSettings> {
        BatchSettings::new(self.batch_size, self.max_wait_time)
    }

    pub fn cache_config(&self) -> Result<CacheConfig> {
        let ttl = match self.cache_ttl {
            Some(secs) => Some(seconds(secs, "cache_ttl")?),
            None => None,
        };
        Ok(CacheConfig {
            size: self.cache,
            ttl,
            key_fields: self.cache_key_fields.clone(),
            redis_url: self.cache_redis_url.clone(),
            redis_options: self.cache_redis_kwargs.clone(),
            redis_prefix: self
                .cache_redis_prefix
                .clone()
                .unwrap_or_else(|| format!("routir:{}", self.name)),
        })
    }
}

/// Batching bounds of one processor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub max_wait_time: Duration,
}

impl BatchSettings {
    pub fn new(batch_size: usize, max_wait_secs: f64) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        Ok(Self {
            batch_size,
            max_wait_time: seconds(max_wait_secs, "max_wait_time")?,
        })
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_wait_time: Duration::from_secs_f64(default_max_wait_time()),
        }
    }
}

/// Cache settings of one processor.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum entries; negative disables caching.
    pub size: i64,
    pub ttl: Option<Duration>,
    pub key_fields: Vec<String>,
    pub redis_url: Option<Secret<String>>,
    pub redis_options: RedisOptions,
    pub redis_prefix: String,
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            size: -1,
            ..Self::default()
        }
    }

    pub fn in_memory(size: i64, ttl: Option<Duration>) -> Self {
        Self {
            size,
            ttl,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.size >= 0
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size: default_cache_size(),
            ttl: None,
            key_fields: default_cache_key_fields(),
            redis_url: None,
            redis_options: RedisOptions::default(),
            redis_prefix: "routir".into(),
        }
    }
}

impl BrokerConfig {
    /// Load from a file path or, if no such file exists, from inline JSON text.
    pub fn load(source: &str) -> Result<Self> {
        let builder = Config::builder();
        let builder = if Path::new(source).exists() {
            builder.add_source(File::with_name(source))
        } else {
            builder.add_source(File::from_str(source, FileFormat::Json))
        };

        let settings = builder
            .add_source(Environment::with_prefix("ROUTIR").separator("__"))
            .build()
            .map_err(|e| Error::config(format!("failed to read configuration: {}", e)))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(Error::config("service entry without a name"));
            }
            service.batch_settings()?;
            service.cache_config()?;
        }
        Ok(())
    }
}

fn seconds(value: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::config(format!("{} must be a non-negative number of seconds", field)))
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    5000
}

fn default_processor() -> String {
    DEFAULT_PROCESSOR.into()
}

fn default_batch_size() -> usize {
    32
}

fn default_max_wait_time() -> f64 {
    0.05
}

fn default_cache_size() -> i64 {
    1024
}

fn default_cache_key_fields() -> Vec<String> {
    vec!["query".into(), "limit".into(), "subset".into()]
}
