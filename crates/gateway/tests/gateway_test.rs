use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use routir_core::{
    config::{BrokerConfig, ServiceConfig},
    mocks::MockEngine,
    traits::Processor,
    types::Role,
};
use routir_gateway::{Broker, EngineFactory, GatewayConfig, GatewayServer};

async fn broker() -> Broker {
    let mut factory = EngineFactory::with_builtins();
    factory
        .register("Mock", |service, _| Ok(Arc::new(MockEngine::new(&service.name))))
        .register("MockScorer", |service, _| {
            Ok(Arc::new(MockEngine::new(&service.name).with_scoring()))
        });

    let config = BrokerConfig {
        server: Default::default(),
        services: vec![
            ServiceConfig::new("bm25", "Mock"),
            ServiceConfig::new("monot5", "MockScorer"),
        ],
        server_imports: Vec::new(),
    };
    Broker::from_config(config, &factory).await.unwrap()
}

fn app(broker: &Broker) -> Router {
    GatewayServer::new(GatewayConfig::default(), broker.registry()).build_router()
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let broker = broker().await;
    let (status, body) = call(
        app(&broker),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    broker.shutdown().await;
}

#[tokio::test]
async fn test_avail_lists_services_per_role() {
    let broker = broker().await;
    let (status, body) = call(
        app(&broker),
        Request::builder().uri("/avail").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["search"], json!(["bm25", "monot5"]));
    assert_eq!(body["query"], json!(["bm25", "monot5"]));
    assert_eq!(body["score"], json!(["monot5"]));
    broker.shutdown().await;
}

#[tokio::test]
async fn test_search_and_query_alias() {
    let broker = broker().await;

    let (status, first) = call(
        app(&broker),
        post("/search", json!({"service": "bm25", "query": "cats", "limit": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["query"], "cats");
    assert_eq!(first["scores"]["doc-cats"], 5.0);
    assert_eq!(first["cached"], false);

    let (status, second) = call(
        app(&broker),
        post("/query", json!({"service": "bm25", "query": "cats", "limit": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["scores"], first["scores"]);
    assert_eq!(second["cached"], true);

    broker.shutdown().await;
}

#[tokio::test]
async fn test_score_endpoint() {
    let broker = broker().await;

    let (status, body) = call(
        app(&broker),
        post(
            "/score",
            json!({"service": "monot5", "query": "cats", "candidates": ["d1", "d2"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scores"], json!({"d1": 1.0, "d2": 0.5}));

    let (status, body) = call(app(&broker), post("/score", json!({"service": "monot5", "query": "cats"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    broker.shutdown().await;
}

#[tokio::test]
async fn test_unknown_service_is_404() {
    let broker = broker().await;

    let (status, body) = call(app(&broker), post("/search", json!({"service": "nope", "query": "cats"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SERVICE_NOT_FOUND");
    assert!(body["trace_id"].as_str().is_some_and(|id| !id.is_empty()));

    // bm25 cannot score.
    let (status, _) = call(
        app(&broker),
        post("/score", json!({"service": "bm25", "query": "cats", "candidates": ["d1"]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    broker.shutdown().await;
}

#[tokio::test]
async fn test_malformed_requests_are_400() {
    let broker = broker().await;

    let (status, body) = call(app(&broker), post("/search", json!({"query": "cats"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    let (status, body) = call(app(&broker), post("/search", json!({"service": "bm25"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    broker.shutdown().await;
}

#[tokio::test]
async fn test_stopped_service_is_503() {
    let broker = broker().await;
    broker.registry().get("bm25", Role::Search).unwrap().stop().await.unwrap();

    let (status, body) = call(app(&broker), post("/search", json!({"service": "bm25", "query": "cats"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "PROCESSOR_NOT_RUNNING");

    broker.shutdown().await;
}
