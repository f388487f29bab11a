mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use common::{dead_peer, Peer};
use routir_core::{
    config::BatchSettings,
    mocks::MockEngine,
    traits::{Engine, Processor},
    types::{BatchArg, Request, Role, SearchBatch},
    Error,
};
use routir_processor::{BatchProcessor, ServiceRegistry};
use routir_relay::RelayEngine;

fn batch(queries: &[&str]) -> SearchBatch {
    SearchBatch::new(queries.iter().map(|q| q.to_string()).collect())
}

#[tokio::test]
async fn test_remote_reads_scores_and_legacy_result() {
    let endpoint = Peer::default().spawn().await;
    let relay = RelayEngine::remote("relay", &endpoint, "bm25").unwrap();

    let output = relay.search_batch(batch(&["cats", "dogs"])).await.unwrap();

    assert_eq!(output.len(), 2);
    assert_eq!(output[0].as_ref().unwrap().get("d1"), Some(&0.9));
    assert_eq!(output[1].as_ref().unwrap().get("d2"), Some(&0.5));
}

#[tokio::test]
async fn test_results_follow_input_order() {
    let endpoint = Peer::default().spawn().await;
    let relay = RelayEngine::remote("relay", &endpoint, "bm25").unwrap();

    let queries = ["slow-150", "slow-0", "slow-100"];
    let started = tokio::time::Instant::now();
    let output = relay.search_batch(batch(&queries)).await.unwrap();

    for (query, scores) in queries.iter().zip(&output) {
        assert!(scores.as_ref().unwrap().contains_key(*query));
    }
    // Forwarded concurrently, so the slowest request bounds the batch.
    assert!(started.elapsed() < Duration::from_millis(240));
}

#[tokio::test]
async fn test_echo_mismatch_fails_only_that_query() {
    let endpoint = Peer::default().spawn().await;
    let relay = RelayEngine::remote("relay", &endpoint, "bm25").unwrap();

    let output = relay.search_batch(batch(&["cats", "liar"])).await.unwrap();

    assert!(output[0].is_ok());
    assert!(matches!(output[1], Err(Error::ProtocolViolation(_))));
}

#[tokio::test]
async fn test_length_mismatch_rejected_before_forwarding() {
    let peer = Peer::default();
    let endpoint = peer.clone().spawn().await;
    let relay = RelayEngine::remote("relay", &endpoint, "bm25").unwrap();

    let result = relay
        .search_batch(batch(&["a", "b", "c"]).with_limits(BatchArg::PerQuery(vec![5, 5])))
        .await;

    match result {
        Err(Error::LengthMismatch {
            field,
            expected,
            actual,
        }) => {
            assert_eq!(field, "limit");
            assert_eq!(expected, 3);
            assert_eq!(actual, 2);
        }
        other => panic!("Expected LengthMismatch, got {:?}", other.map(|o| o.len())),
    }
    assert_eq!(peer.hits(), 0);
}

#[tokio::test]
async fn test_peer_error_fails_whole_batch() {
    let endpoint = Peer::default().spawn().await;
    let relay = RelayEngine::remote("relay", &endpoint, "bm25").unwrap();

    let result = relay.search_batch(batch(&["cats", "boom"])).await;
    assert!(matches!(result, Err(Error::Transport(_))));
}

#[tokio::test]
async fn test_unreachable_peer_is_transport_error() {
    let relay = RelayEngine::remote("relay", &dead_peer().await, "bm25").unwrap();

    let result = relay.search_batch(batch(&["cats"])).await;
    assert!(matches!(result, Err(Error::Transport(_))));
}

#[tokio::test]
async fn test_forwarded_payload_fields() {
    let peer = Peer::default();
    let endpoint = peer.clone().spawn().await;
    let config = json!({
        "service": "bm25",
        "endpoint": endpoint,
        "other_request_kwargs": {"rm3": true}
    });
    let relay = RelayEngine::from_config(
        "bm25-relay",
        config.as_object().unwrap(),
        Arc::new(ServiceRegistry::new()),
    )
    .unwrap();

    let request = batch(&["cats", "dogs"])
        .with_limits(BatchArg::Shared(10))
        .with_subsets(BatchArg::PerQuery(vec!["msmarco".into(), "none".into()]));
    relay.search_batch(request).await.unwrap();

    let mut payloads = peer.payloads();
    payloads.sort_by_key(|p| p["query"].as_str().map(String::from));
    assert_eq!(
        payloads,
        vec![
            json!({"query": "cats", "service": "bm25", "subset": "msmarco", "limit": 10, "rm3": true}),
            json!({"query": "dogs", "service": "bm25", "subset": "none", "limit": 10, "rm3": true}),
        ]
    );
}

async fn local_registry() -> Arc<ServiceRegistry> {
    let registry = Arc::new(ServiceRegistry::new());
    let processor: Arc<dyn Processor> = Arc::new(BatchProcessor::query(
        Arc::new(MockEngine::new("bm25")),
        BatchSettings::default(),
    ));
    processor.start().await.unwrap();
    registry.register("bm25", Role::Query, processor);
    registry
}

#[tokio::test]
async fn test_local_mode_uses_query_role() {
    let registry = local_registry().await;
    let relay = RelayEngine::local("relay", "bm25", registry.clone());

    let output = relay
        .search_batch(batch(&["cats", "dogs"]).with_limits(BatchArg::Shared(7)))
        .await
        .unwrap();

    assert_eq!(output[0].as_ref().unwrap().get("doc-cats"), Some(&7.0));
    assert_eq!(output[1].as_ref().unwrap().get("doc-dogs"), Some(&7.0));

    registry.stop_all().await;
}

#[tokio::test]
async fn test_local_target_resolved_per_batch() {
    let registry = Arc::new(ServiceRegistry::new());
    let relay = RelayEngine::local("relay", "bm25", registry.clone());

    let missing = relay.search_batch(batch(&["cats"])).await;
    assert!(matches!(missing, Err(Error::ServiceNotFound { .. })));

    let processor: Arc<dyn Processor> = Arc::new(BatchProcessor::query(
        Arc::new(MockEngine::new("bm25")),
        BatchSettings::default(),
    ));
    processor.start().await.unwrap();
    registry.register("bm25", Role::Query, processor);

    let output = relay.search_batch(batch(&["cats"])).await.unwrap();
    assert!(output[0].as_ref().unwrap().contains_key("doc-cats"));

    registry.stop_all().await;
}

#[tokio::test]
async fn test_relay_behind_processor_fans_out_results() {
    let endpoint = Peer::default().spawn().await;
    let relay = RelayEngine::remote("relay", &endpoint, "bm25").unwrap();
    let processor = BatchProcessor::query(Arc::new(relay), BatchSettings::default());
    processor.start().await.unwrap();

    let (cats, liar) = tokio::join!(
        processor.submit(Request::new("cats")),
        processor.submit(Request::new("liar")),
    );

    assert_eq!(cats.unwrap().scores.get("d1"), Some(&0.9));
    assert!(matches!(liar, Err(Error::ProtocolViolation(_))));

    processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_missing_local_target_reaches_callers_as_not_found() {
    let registry = Arc::new(ServiceRegistry::new());
    let relay = RelayEngine::local("alias", "ghost", registry.clone());
    let processor = BatchProcessor::query(Arc::new(relay), BatchSettings::default());
    processor.start().await.unwrap();

    let (first, second) = tokio::join!(
        processor.submit(Request::new("cats")),
        processor.submit(Request::new("dogs")),
    );
    for result in [first, second] {
        match result {
            Err(Error::ServiceNotFound { name, role }) => {
                assert_eq!(name, "ghost");
                assert_eq!(role, Role::Query);
            }
            other => panic!("Expected ServiceNotFound, got {:?}", other),
        }
    }

    processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_limit_forwarded_only_when_given() {
    let peer = Peer::default();
    let endpoint = peer.clone().spawn().await;
    let relay = RelayEngine::remote("relay", &endpoint, "bm25").unwrap();
    let processor = BatchProcessor::query(
        Arc::new(relay),
        BatchSettings {
            batch_size: 2,
            max_wait_time: Duration::from_millis(50),
        },
    );
    processor.start().await.unwrap();

    let (cats, dogs) = tokio::join!(
        processor.submit(Request::new("cats").with_limit(5)),
        processor.submit(Request::new("dogs")),
    );
    cats.unwrap();
    dogs.unwrap();

    let mut payloads = peer.payloads();
    payloads.sort_by_key(|p| p["query"].as_str().map(String::from));
    assert_eq!(payloads[0]["limit"], json!(5));
    assert!(payloads[1].get("limit").is_none());

    processor.stop().await.unwrap();
}
