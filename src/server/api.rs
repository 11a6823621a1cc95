//! Gateway HTTP API.
//!
//! - POST /api/chat
//! - GET /health
//! - GET /api/ollama-status
//! - GET /api/openrouter-status
//! - GET /metrics

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, ServerConfig};
use crate::error::{RelayError, StartupError};
use crate::metrics::RelayMetrics;
use crate::probe::{probe_ollama, probe_openrouter, StatusReport};
use crate::relay::{Backend, ChatRequest, Relay};
use crate::server::streaming::{event_stream_response, StreamContext};

/// Application state shared across handlers.
pub struct AppState {
    pub relay: Relay,
    pub config: Arc<Config>,
    /// Shared client for probes; adapters hold their own clone.
    pub client: reqwest::Client,
    pub metrics: RelayMetrics,
}

impl AppState {
    /// Build the relay, HTTP client and metrics from a validated configuration.
    pub fn new(config: Arc<Config>) -> Result<Self, StartupError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("chat-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let relay = Relay::from_config(client.clone(), &config)?;
        let metrics = RelayMetrics::new()?;

        Ok(Self {
            relay,
            config,
            client,
            metrics,
        })
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server);

    Router::new()
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .route("/api/ollama-status", get(ollama_status))
        .route("/api/openrouter-status", get(openrouter_status))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

// ─── Error Responses ───────────────────────────────────────────────────────

/// JSON error returned before any frame has been streamed.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    backend: Backend,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
    backend: Backend,
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self {
            status: StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY),
            message: err.to_string(),
            backend: err.backend(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            status: self.status.as_u16(),
            backend: self.backend,
        };
        (self.status, Json(body)).into_response()
    }
}

// ─── Response Types ────────────────────────────────────────────────────────

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let backend = req.backend;

    info!(
        request_id = %request_id,
        backend = %backend,
        messages = req.messages.len(),
        system_prompt = req.system_prompt.is_some(),
        "Chat request"
    );
    state.metrics.record_request(backend);

    let events = state.relay.open(&req).await.map_err(|e| {
        warn!(request_id = %request_id, backend = %backend, "Upstream failed: {e}");
        state.metrics.record_upstream_error(backend, e.kind());
        ApiError::from(e)
    })?;

    Ok(event_stream_response(
        events,
        StreamContext {
            request_id,
            backend,
            metrics: state.metrics.clone(),
        },
    ))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Local::now().to_rfc3339(),
    })
}

async fn ollama_status(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    Json(
        probe_ollama(
            &state.client,
            &state.config.ollama,
            state.config.probe.timeout(),
        )
        .await,
    )
}

async fn openrouter_status(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    Json(
        probe_openrouter(
            &state.client,
            &state.config.openrouter,
            state.config.probe.timeout(),
        )
        .await,
    )
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|e| {
        warn!("Failed to render metrics: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
