//! In-process peer broker for relay tests.
#![allow(dead_code)]

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

#[derive(Clone, Default)]
pub struct Peer {
    pub hits: Arc<AtomicUsize>,
    pub payloads: Arc<Mutex<Vec<Value>>>,
    pub services: Vec<String>,
    /// Advertise services under the old `query` key.
    pub legacy: bool,
}

impl Peer {
    pub fn offering(services: &[&str]) -> Self {
        Self {
            services: services.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }

    /// Serve on an ephemeral port and return the base URL.
    pub async fn spawn(self) -> String {
        let app = Router::new()
            .route("/query", post(query))
            .route("/avail", get(avail))
            .with_state(self);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

/// `cats` answers with `scores`, `dogs` with the legacy `result`, `liar`
/// echoes the wrong query, `boom` fails, `slow-<ms>` sleeps first. Anything
/// else scores itself 1.0.
async fn query(State(peer): State<Peer>, Json(payload): Json<Value>) -> (StatusCode, Json<Value>) {
    peer.hits.fetch_add(1, Ordering::SeqCst);
    peer.payloads.lock().unwrap().push(payload.clone());

    let text = payload["query"].as_str().unwrap_or_default().to_string();
    if let Some(ms) = text.strip_prefix("slow-").and_then(|ms| ms.parse().ok()) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    let body = match text.as_str() {
        "cats" => json!({"query": "cats", "scores": {"d1": 0.9}}),
        "dogs" => json!({"query": "dogs", "result": {"d2": 0.5}}),
        "liar" => json!({"query": "somebody else", "scores": {"d9": 1.0}}),
        "boom" => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"code": "INTERNAL", "message": "boom"})),
            )
        }
        other => {
            let mut scores = Map::new();
            scores.insert(other.to_string(), json!(1.0));
            json!({"query": other, "scores": scores})
        }
    };
    (StatusCode::OK, Json(body))
}

async fn avail(State(peer): State<Peer>) -> Json<Value> {
    if peer.legacy {
        Json(json!({"query": peer.services}))
    } else {
        Json(json!({"search": peer.services, "score": []}))
    }
}

/// A base URL nothing listens on.
pub async fn dead_peer() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
