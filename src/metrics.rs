//! Prometheus counters for relayed chat streams.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::relay::Backend;

/// Relay counters registered on a private registry.
#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,
    requests: IntCounterVec,
    upstream_errors: IntCounterVec,
    tokens: IntCounterVec,
    completed: IntCounterVec,
}

impl RelayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("chat_relay_requests_total", "Chat requests received"),
            &["backend"],
        )?;
        let upstream_errors = IntCounterVec::new(
            Opts::new(
                "chat_relay_upstream_errors_total",
                "Upstream failures by kind",
            ),
            &["backend", "kind"],
        )?;
        let tokens = IntCounterVec::new(
            Opts::new("chat_relay_tokens_relayed_total", "Token frames sent to clients"),
            &["backend"],
        )?;
        let completed = IntCounterVec::new(
            Opts::new(
                "chat_relay_streams_completed_total",
                "Streams that reached [DONE]",
            ),
            &["backend"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(upstream_errors.clone()))?;
        registry.register(Box::new(tokens.clone()))?;
        registry.register(Box::new(completed.clone()))?;

        Ok(Self {
            registry,
            requests,
            upstream_errors,
            tokens,
            completed,
        })
    }

    pub fn record_request(&self, backend: Backend) {
        self.requests.with_label_values(&[backend.as_str()]).inc();
    }

    pub fn record_upstream_error(&self, backend: Backend, kind: &str) {
        self.upstream_errors
            .with_label_values(&[backend.as_str(), kind])
            .inc();
    }

    pub fn record_token(&self, backend: Backend) {
        self.tokens.with_label_values(&[backend.as_str()]).inc();
    }

    pub fn record_completed(&self, backend: Backend) {
        self.completed.with_label_values(&[backend.as_str()]).inc();
    }

    /// Render all counters in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
