//! Peer wire protocol.
//!
//! `GET {peer}/avail` lists services; `POST {peer}/query` answers one query
//! and must echo the query text back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use routir_core::{types::Scores, Error, Result};

pub const AVAIL_PATH: &str = "avail";
pub const QUERY_PATH: &str = "query";

/// Body of `GET /avail`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Vec<String>>,
    /// Older peers list searchable services here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Vec<String>>,
}

impl AvailResponse {
    /// Searchable services, falling back to the legacy `query` list.
    pub fn search_services(self) -> Vec<String> {
        self.search.or(self.query).unwrap_or_default()
    }
}

/// Join a peer base URL and a path without doubling slashes.
pub fn peer_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Check the echoed query and pull the scores out of a peer response.
///
/// Scores are read from `scores`, then the legacy `result`, then default to
/// empty.
pub fn extract_scores(query: &str, response: &Value) -> Result<Scores> {
    match response.get("query").and_then(Value::as_str) {
        Some(echoed) if echoed == query => {}
        Some(echoed) => {
            return Err(Error::protocol_violation(format!(
                "peer answered `{}` for query `{}`",
                echoed, query
            )))
        }
        None => {
            return Err(Error::protocol_violation(format!(
                "peer response for `{}` does not echo the query",
                query
            )))
        }
    }

    match response.get("scores").or_else(|| response.get("result")) {
        Some(Value::Null) | None => Ok(Scores::new()),
        Some(scores) => serde_json::from_value(scores.clone()).map_err(|e| {
            Error::protocol_violation(format!("malformed scores for `{}`: {}", query, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scores_then_result_fallback() {
        let modern = json!({"query": "cats", "scores": {"d1": 0.9}});
        let legacy = json!({"query": "dogs", "result": {"d2": 0.5}});
        let empty = json!({"query": "fish"});

        assert_eq!(extract_scores("cats", &modern).unwrap().get("d1"), Some(&0.9));
        assert_eq!(extract_scores("dogs", &legacy).unwrap().get("d2"), Some(&0.5));
        assert!(extract_scores("fish", &empty).unwrap().is_empty());
    }

    #[test]
    fn test_echo_mismatch_is_violation() {
        let response = json!({"query": "dogs", "scores": {}});
        assert!(matches!(
            extract_scores("cats", &response),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(matches!(
            extract_scores("cats", &json!({"scores": {}})),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_avail_legacy_key() {
        let modern: AvailResponse = serde_json::from_value(json!({"search": ["a"], "query": ["b"]})).unwrap();
        let legacy: AvailResponse = serde_json::from_value(json!({"query": ["b"]})).unwrap();
        assert_eq!(modern.search_services(), vec!["a"]);
        assert_eq!(legacy.search_services(), vec!["b"]);
    }

    #[test]
    fn test_peer_url() {
        assert_eq!(peer_url("http://peer:5000/", "query"), "http://peer:5000/query");
        assert_eq!(peer_url("http://peer:5000", "avail"), "http://peer:5000/avail");
    }
}
