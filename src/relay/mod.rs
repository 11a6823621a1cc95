//! Streaming relay core.
//!
//! - [`types`]: Chat requests and the backend-agnostic [`RelayEvent`]
//! - [`adapter`]: The [`ChatAdapter`] seam and shared upstream plumbing
//! - [`ollama`]: Newline-delimited JSON decoding for Ollama
//! - [`openrouter`]: SSE decoding for OpenRouter
//! - [`frame`]: Client-facing `data: ...` frames
//!
//! The relay picks an adapter from the request's backend, opens the upstream
//! stream and hands back a lazy event stream that ends at the first `Done` or
//! `Error`. Nothing is buffered beyond the event being decoded, so a slow
//! client slows down reads from the upstream.

pub mod adapter;
pub mod frame;
pub mod ollama;
pub mod openrouter;
pub mod types;

use std::sync::Arc;

use futures::future;
use futures::stream::StreamExt;
use tracing::debug;

pub use adapter::{ChatAdapter, EventStream};
pub use types::{Backend, ChatRequest, Message, RelayEvent, Role};

use crate::config::{Config, ConfigError};
use crate::error::RelayError;
use ollama::OllamaAdapter;
use openrouter::OpenRouterAdapter;

/// Routes chat requests to one of the two backend adapters.
#[derive(Clone)]
pub struct Relay {
    ollama: Arc<dyn ChatAdapter>,
    openrouter: Arc<dyn ChatAdapter>,
}

impl Relay {
    pub fn new(ollama: Arc<dyn ChatAdapter>, openrouter: Arc<dyn ChatAdapter>) -> Self {
        Self { ollama, openrouter }
    }

    /// Build both adapters from configuration, sharing one HTTP client.
    pub fn from_config(client: reqwest::Client, config: &Config) -> Result<Self, ConfigError> {
        let ollama = OllamaAdapter::new(client.clone(), &config.ollama);
        let openrouter = OpenRouterAdapter::new(client, &config.openrouter)?;
        Ok(Self::new(Arc::new(ollama), Arc::new(openrouter)))
    }

    /// The adapter serving `backend`.
    pub fn select(&self, backend: Backend) -> &dyn ChatAdapter {
        match backend {
            Backend::OpenRouter => self.openrouter.as_ref(),
            Backend::Ollama => self.ollama.as_ref(),
        }
    }

    /// Open the upstream stream for `request`.
    ///
    /// Errors here happen before any frame is produced. The returned stream
    /// yields events in upstream order and stops after the first terminal event.
    pub async fn open(&self, request: &ChatRequest) -> Result<EventStream, RelayError> {
        let adapter = self.select(request.backend);
        debug!(backend = %adapter.backend(), "Opening upstream stream");
        let events = adapter.open(request).await?;
        Ok(until_terminal(events))
    }
}

/// Pass events through up to and including the first `Done` or `Error`.
pub fn until_terminal(events: EventStream) -> EventStream {
    events
        .scan(false, |closed, event| {
            if *closed {
                return future::ready(None);
            }
            *closed = event.is_terminal();
            future::ready(Some(event))
        })
        .boxed()
}
