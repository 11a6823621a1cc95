//! chat-relay: streaming chat gateway for LLM backends.
//!
//! Accepts chat requests on a single endpoint and relays the token stream of
//! either a local Ollama server or OpenRouter back to the client as
//! server-sent events:
//!   client → /api/chat → relay → adapter (Ollama NDJSON | OpenRouter SSE) → `data:` frames
//!
//! Both backends are normalized into one event stream that ends with
//! `data: [DONE]` on success.

pub mod config;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod relay;
pub mod server;
