//! Fake upstream backends for integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use chat_relay::config::Config;
use chat_relay::server::api::{build_router, AppState};

pub const API_KEY: &str = "sk-or-v1-integration-test";

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn test_config(ollama_url: &str, openrouter_url: &str) -> Config {
    let mut config = Config::default();
    config.ollama.base_url = ollama_url.to_string();
    config.ollama.timeout_secs = 1;
    config.openrouter.completions_url = format!("{openrouter_url}/chat/completions");
    config.openrouter.models_url = format!("{openrouter_url}/models");
    config.openrouter.api_key = Some(API_KEY.to_string());
    config.openrouter.timeout_secs = 1;
    config.probe.timeout_secs = 1;
    config
}

pub fn gateway(config: Config) -> Router {
    let state = AppState::new(Arc::new(config)).unwrap();
    build_router(Arc::new(state))
}

fn chunked(chunks: Vec<String>) -> Body {
    Body::from_stream(stream::iter(chunks).map(Ok::<_, Infallible>))
}

/// Ollama fake: echoes the top-level `system` field (or `-`) as the first
/// token, then streams "Hello", " world" and a final done object.
pub fn ollama_router() -> Router {
    async fn chat(Json(body): Json<Value>) -> Response {
        let system = body["system"].as_str().unwrap_or("-").to_string();
        let chunks = vec![
            format!("{}\n", json!({"message": {"role": "assistant", "content": system}, "done": false})),
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hello\"},\"done\":false}\n".to_string(),
            "{\"message\":{\"role\":\"assistant\",\"con".to_string(),
            "tent\":\" world\"},\"done\":false}\n".to_string(),
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n".to_string(),
        ];
        ([("content-type", "application/x-ndjson")], chunked(chunks)).into_response()
    }

    async fn version() -> Json<Value> {
        Json(json!({"version": "0.5.7"}))
    }

    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/version", get(version))
}

/// Ollama fake that rejects every chat with a 404.
pub fn ollama_missing_model_router() -> Router {
    async fn chat() -> impl IntoResponse {
        (StatusCode::NOT_FOUND, r#"{"error":"model \"llama3.2\" not found"}"#)
    }
    async fn version() -> impl IntoResponse {
        StatusCode::SERVICE_UNAVAILABLE
    }

    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/version", get(version))
}

/// Ollama fake that sends one token and then goes silent.
pub fn ollama_stalling_router() -> Router {
    async fn chat() -> Response {
        let first = stream::iter(vec![Ok::<_, Infallible>(
            "{\"message\":{\"content\":\"a\"}}\n".to_string(),
        )]);
        Body::from_stream(first.chain(stream::pending())).into_response()
    }
    Router::new().route("/api/chat", post(chat))
}

/// Ollama fake that fails with a 500 and never finishes the error body.
pub fn ollama_stalled_error_router() -> Router {
    async fn chat() -> Response {
        let partial = stream::iter(vec![Ok::<_, Infallible>("{\"error\":".to_string())]);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Body::from_stream(partial.chain(stream::pending())),
        )
            .into_response()
    }
    Router::new().route("/api/chat", post(chat))
}

/// Ollama fake that takes too long to answer at all.
pub fn ollama_slow_router() -> Router {
    async fn chat() -> &'static str {
        tokio::time::sleep(Duration::from_secs(3)).await;
        "{\"message\":{\"content\":\"late\"}}\n"
    }
    Router::new().route("/api/chat", post(chat))
}

/// OpenRouter fake: requires the bearer key and referer, echoes the first
/// message's role as a token, streams "hi", then `[DONE]` followed by a line
/// that must never be relayed.
pub fn openrouter_router() -> Router {
    async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> Response {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some(format!("Bearer {API_KEY}").as_str());
        if !authorized || headers.get("http-referer").is_none() {
            return (StatusCode::UNAUTHORIZED, r#"{"error":{"message":"No auth credentials found","code":401}}"#)
                .into_response();
        }

        let role = body["messages"][0]["role"].as_str().unwrap_or("none").to_string();
        let delta = |content: &str| {
            format!("data: {}\n\n", json!({"choices": [{"delta": {"content": content}}]}))
        };
        let chunks = vec![
            ": OPENROUTER PROCESSING\n\n".to_string(),
            delta(&role),
            delta("hi"),
            "data: [DONE]\n\n".to_string(),
            delta("after-done"),
        ];
        ([("content-type", "text/event-stream")], chunked(chunks)).into_response()
    }

    async fn models(headers: HeaderMap) -> StatusCode {
        if headers.contains_key("authorization") {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        }
    }

    Router::new()
        .route("/chat/completions", post(completions))
        .route("/models", get(models))
}

/// Split a response body into its `data:` payloads.
pub fn frames(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter(|f| !f.is_empty())
        .map(|f| f.strip_prefix("data: ").unwrap_or(f).to_string())
        .collect()
}
