//! Errors raised while opening an upstream stream.
//!
//! Everything here happens before the first frame reaches the client, so the
//! gateway can still answer with a proper HTTP status. Failures after that
//! point travel in-band as [`RelayEvent::Error`](crate::relay::RelayEvent).

use thiserror::Error;

use crate::config::ConfigError;
use crate::relay::Backend;

/// Failures while assembling the gateway's shared state.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{backend} API error: status {status}: {body}")]
    UpstreamStatus {
        backend: Backend,
        status: u16,
        body: String,
    },

    #[error("Failed to connect to {backend}: {source}")]
    Connect {
        backend: Backend,
        #[source]
        source: reqwest::Error,
    },

    #[error("{backend} did not respond within {secs}s")]
    Timeout { backend: Backend, secs: u64 },

    #[error("{backend} request failed: {message}")]
    Transport { backend: Backend, message: String },
}

impl RelayError {
    /// Classify a reqwest failure from the send phase.
    pub fn from_send(backend: Backend, secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::Timeout { backend, secs }
        } else if err.is_connect() {
            RelayError::Connect {
                backend,
                source: err,
            }
        } else {
            RelayError::Transport {
                backend,
                message: err.to_string(),
            }
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            RelayError::UpstreamStatus { backend, .. }
            | RelayError::Connect { backend, .. }
            | RelayError::Timeout { backend, .. }
            | RelayError::Transport { backend, .. } => *backend,
        }
    }

    /// HTTP status the gateway answers with. Upstream statuses pass through.
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::UpstreamStatus { status, .. } => *status,
            RelayError::Connect { .. } | RelayError::Transport { .. } => 502,
            RelayError::Timeout { .. } => 504,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::UpstreamStatus { .. } => "status",
            RelayError::Connect { .. } => "connect",
            RelayError::Timeout { .. } => "timeout",
            RelayError::Transport { .. } => "transport",
        }
    }
}
