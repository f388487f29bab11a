//! Axum-based HTTP server for the broker.

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use routir_core::{
    config::ServerConfig,
    types::{Request, Role},
    Error, Result,
};
use routir_processor::ServiceRegistry;
use routir_relay::AvailResponse;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Enable CORS.
    pub enable_cors: bool,
    /// Enable request tracing.
    pub enable_tracing: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        ServerConfig::default().into()
    }
}

impl From<ServerConfig> for GatewayConfig {
    fn from(server: ServerConfig) -> Self {
        Self {
            host: server.host,
            port: server.port,
            enable_cors: true,
            enable_tracing: true,
        }
    }
}

/// Shared application state.
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
}

/// Gateway server.
pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<AppState>,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            config,
            state: Arc::new(AppState { registry }),
            metrics_handle: None,
        }
    }

    /// Set metrics handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/avail", get(avail_handler))
            .route("/search", post(search_handler))
            .route("/query", post(search_handler))
            .route("/score", post(score_handler))
            .with_state(self.state.clone());

        if let Some(handle) = &self.metrics_handle {
            let handle = handle.clone();
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        if self.config.enable_cors {
            router = router.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any));
        }

        if self.config.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Run the server until the process is killed.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves, then finish in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::config(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "Gateway server starting");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Version.
    pub version: String,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Trace ID.
    pub trace_id: Option<String>,
}

/// A broker error bound to the request it failed.
struct ApiError {
    error: Error,
    trace_id: String,
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::ServiceNotFound { .. } => StatusCode::NOT_FOUND,
        Error::InvalidRequest(_) | Error::LengthMismatch { .. } => StatusCode::BAD_REQUEST,
        Error::ProcessorNotRunning(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        if status.is_server_error() {
            tracing::error!(trace_id = %self.trace_id, error = %self.error, "Request failed");
        } else {
            tracing::debug!(trace_id = %self.trace_id, error = %self.error, "Request rejected");
        }

        let body = ErrorResponse {
            code: self.error.code().to_string(),
            message: self.error.to_string(),
            trace_id: Some(self.trace_id),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Services offered, per role. Peers read `search` during discovery.
async fn avail_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(AvailResponse {
        search: Some(state.registry.services(Role::Search)),
        score: Some(state.registry.services(Role::Score)),
        query: Some(state.registry.services(Role::Query)),
    })
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Request>, JsonRejection>,
) -> Response {
    dispatch(&state, Role::Search, payload).await
}

async fn score_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Request>, JsonRejection>,
) -> Response {
    dispatch(&state, Role::Score, payload).await
}

/// Resolve the named service under `role` and submit the request to it.
async fn dispatch(
    state: &AppState,
    role: Role,
    payload: std::result::Result<Json<Request>, JsonRejection>,
) -> Response {
    let trace_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", trace_id = %trace_id, role = %role);

    let result = async {
        let Json(request) =
            payload.map_err(|e| Error::invalid_request(format!("malformed request body: {}", e)))?;
        let service = request
            .service
            .clone()
            .ok_or_else(|| Error::invalid_request("request has no `service`"))?;

        tracing::debug!(service = %service, query_len = request.query.len(), "Dispatching");
        let processor = state.registry.get(&service, role)?;
        processor.submit(request).await
    }
    .instrument(span)
    .await;

    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => ApiError { error, trace_id }.into_response(),
    }
}
