use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// =============================================================================
// Request Types
// =============================================================================

/// Document id to score mapping returned by engines.
pub type Scores = BTreeMap<String, f64>;

/// Subset tag sent to peers when the caller did not ask for one.
pub const NO_SUBSET: &str = "none";

/// A single submission to a processor.
///
/// Wire form is a flat JSON object; fields the broker does not know about are
/// kept in `extra` and forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Query text.
    pub query: String,

    /// Target service name, when the request travels over HTTP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Maximum number of documents to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Subset (collection partition) filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset: Option<String>,

    /// Candidate documents for pairwise scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<String>>,

    /// Auxiliary keyword arguments.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Request {
    /// Create a request carrying only query text.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_subset(mut self, subset: impl Into<String>) -> Self {
        self.subset = Some(subset.into());
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Look up a field by its wire name.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "query" => Some(Value::String(self.query.clone())),
            "service" => self.service.clone().map(Value::String),
            "limit" => self.limit.map(Value::from),
            "subset" => self.subset.clone().map(Value::String),
            "candidates" => self.candidates.clone().map(Value::from),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Deterministic cache key built from an ordered list of field names.
    ///
    /// Missing fields contribute an empty string, so `["query", "limit"]` maps
    /// `{"query": "cats"}` to `["cats",""]`.
    pub fn cache_key(&self, fields: &[String]) -> String {
        let parts: Vec<Value> = fields
            .iter()
            .map(|f| self.field(f).unwrap_or_else(|| Value::String(String::new())))
            .collect();
        Value::Array(parts).to_string()
    }
}

/// Result of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Echo of the submitted query text.
    pub query: String,
    /// Service that produced the scores.
    pub service: String,
    /// Scored documents.
    pub scores: Scores,
    /// Whether the scores came from the cache.
    #[serde(default)]
    pub cached: bool,
}
