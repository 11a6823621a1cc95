//! Backend reachability probes for the status endpoints.
//!
//! Probes never fail: any connection error, timeout or non-200 status is
//! reported as `offline` with a human-readable message.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{OllamaConfig, OpenRouterConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Online,
    Offline,
}

/// Body of `GET /api/ollama-status` and `GET /api/openrouter-status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: ServiceStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl StatusReport {
    fn offline(message: String) -> Self {
        Self {
            status: ServiceStatus::Offline,
            message,
            version: None,
            model: None,
        }
    }
}

/// Query Ollama's version endpoint.
pub async fn probe_ollama(
    client: &reqwest::Client,
    config: &OllamaConfig,
    timeout: Duration,
) -> StatusReport {
    let response = match client.get(config.version_url()).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("Ollama probe failed: {e}");
            return StatusReport::offline(format!("Failed to connect to Ollama service: {e}"));
        }
    };

    if response.status() != StatusCode::OK {
        return StatusReport::offline(format!(
            "Ollama service returned status code {}",
            response.status().as_u16()
        ));
    }

    let version = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("version").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());

    StatusReport {
        status: ServiceStatus::Online,
        message: "Ollama service is running".to_string(),
        version: Some(version),
        model: Some(config.model.clone()),
    }
}

/// List OpenRouter models with the configured credential.
pub async fn probe_openrouter(
    client: &reqwest::Client,
    config: &OpenRouterConfig,
    timeout: Duration,
) -> StatusReport {
    let mut request = client.get(config.models_url.as_str()).timeout(timeout);
    if let Some(key) = &config.api_key {
        request = request.bearer_auth(key);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("OpenRouter probe failed: {e}");
            return StatusReport::offline(format!(
                "Failed to connect to OpenRouter service: {e}"
            ));
        }
    };

    if response.status() != StatusCode::OK {
        return StatusReport::offline(format!(
            "OpenRouter service returned status code {}",
            response.status().as_u16()
        ));
    }

    StatusReport {
        status: ServiceStatus::Online,
        message: "OpenRouter service is running".to_string(),
        version: None,
        model: Some(config.model.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_report_omits_optional_fields() {
        let report = StatusReport::offline("down".to_string());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({"status": "offline", "message": "down"}));
    }

    #[tokio::test]
    async fn test_unroutable_ollama_is_offline() {
        let config = OllamaConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..OllamaConfig::default()
        };
        let report = probe_ollama(&reqwest::Client::new(), &config, Duration::from_secs(3)).await;
        assert_eq!(report.status, ServiceStatus::Offline);
        assert!(report.message.starts_with("Failed to connect to Ollama service"));
    }
}
