//! Relay engine: forwards batches to a peer broker or a local processor.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

use routir_core::{
    traits::Engine,
    types::{BatchOutput, Request, Role, SearchBatch, NO_SUBSET},
    Error, Result,
};
use routir_processor::ServiceRegistry;

use crate::protocol::{extract_scores, peer_url, QUERY_PATH};

/// Engine-specific settings of a `Relay` service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    /// Service name to ask the target for.
    pub service: Option<String>,
    /// Peer base URL. Absent means relay within this process.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Fields merged into every forwarded request.
    #[serde(default)]
    pub other_request_kwargs: Map<String, Value>,
}

enum Target {
    Remote { url: String, client: reqwest::Client },
    Local { registry: Arc<ServiceRegistry> },
}

impl Target {
    fn mode(&self) -> &'static str {
        match self {
            Target::Remote { .. } => "remote",
            Target::Local { .. } => "local",
        }
    }
}

/// Engine that scores nothing itself and forwards each query elsewhere.
///
/// Every query of a batch becomes one forwarded request; requests run
/// concurrently and results come back in input order. A failed network call
/// fails the whole batch, while a response that does not echo its query only
/// fails that query.
pub struct RelayEngine {
    name: String,
    service: String,
    target: Target,
    request_kwargs: Map<String, Value>,
}

impl RelayEngine {
    /// Relay to `service` on the peer at `endpoint`.
    pub fn remote(name: &str, endpoint: &str, service: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("invalid relay endpoint `{}`: {}", endpoint, e)))?;
        Ok(Self {
            name: name.to_string(),
            service: service.to_string(),
            target: Target::Remote {
                url: peer_url(endpoint.as_str(), QUERY_PATH),
                client: reqwest::Client::new(),
            },
            request_kwargs: Map::new(),
        })
    }

    /// Relay to the processor registered as `service` under the query role.
    ///
    /// The target is looked up on every batch, so it may be registered after
    /// this engine is built.
    pub fn local(name: &str, service: &str, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            name: name.to_string(),
            service: service.to_string(),
            target: Target::Local { registry },
            request_kwargs: Map::new(),
        }
    }

    /// Build from a service's `config` map.
    pub fn from_config(
        name: &str,
        config: &Map<String, Value>,
        registry: Arc<ServiceRegistry>,
    ) -> Result<Self> {
        let parsed: RelayConfig = serde_json::from_value(Value::Object(config.clone()))
            .map_err(|e| Error::config(format!("invalid relay config for `{}`: {}", name, e)))?;
        let service = parsed
            .service
            .ok_or_else(|| Error::config(format!("relay `{}` requires `service`", name)))?;

        let engine = match parsed.endpoint {
            Some(endpoint) => Self::remote(name, &endpoint, &service)?,
            None => Self::local(name, &service, registry),
        };
        Ok(engine.with_request_kwargs(parsed.other_request_kwargs))
    }

    /// Share an HTTP client instead of the engine's own. No effect in local mode.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        if let Target::Remote { client: own, .. } = &mut self.target {
            *own = client;
        }
        self
    }

    pub fn with_request_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.request_kwargs = kwargs;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.target, Target::Remote { .. })
    }

    /// One forwarded request per query: base fields, then the configured
    /// extras, then the query's own arguments. Later keys win.
    fn payloads(&self, batch: &SearchBatch) -> Vec<Map<String, Value>> {
        (0..batch.len())
            .map(|i| {
                let mut payload = Map::new();
                payload.insert("query".into(), Value::String(batch.queries[i].clone()));
                payload.insert("service".into(), Value::String(self.service.clone()));
                payload.insert(
                    "subset".into(),
                    Value::String(batch.subset(i).unwrap_or(NO_SUBSET).to_string()),
                );
                payload.extend(self.request_kwargs.clone());
                if let Some(limit) = batch.limit(i) {
                    payload.insert("limit".into(), Value::from(limit));
                }
                payload.extend(batch.kwargs_at(i));
                payload
            })
            .collect()
    }

    async fn forward(&self, payload: Map<String, Value>) -> Result<Value> {
        match &self.target {
            Target::Remote { url, client } => {
                let response = client
                    .post(url)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| Error::transport(format!("POST {} failed: {}", url, e)))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::transport(format!(
                        "POST {} returned {}: {}",
                        url, status, body
                    )));
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|e| Error::transport(format!("unreadable response from {}: {}", url, e)))
            }
            Target::Local { registry } => {
                let processor = registry.get(&self.service, Role::Query)?;
                let request: Request = serde_json::from_value(Value::Object(payload))?;
                let response = processor.submit(request).await?;
                Ok(serde_json::to_value(response)?)
            }
        }
    }
}

#[async_trait]
impl Engine for RelayEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search_batch(&self, batch: SearchBatch) -> Result<BatchOutput> {
        batch.validate()?;

        let mode = self.target.mode();
        metrics::counter!(
            "routir_relay_requests_total",
            "service" => self.name.clone(),
            "mode" => mode
        )
        .increment(batch.len() as u64);
        tracing::debug!(
            relay = %self.name,
            target = %self.service,
            mode,
            queries = batch.len(),
            "Forwarding batch"
        );

        let responses = try_join_all(self.payloads(&batch).into_iter().map(|p| self.forward(p))).await?;

        Ok(batch
            .queries
            .iter()
            .zip(&responses)
            .map(|(query, response)| extract_scores(query, response))
            .collect())
    }
}
