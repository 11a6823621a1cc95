//! OpenRouter (OpenAI-compatible) chat completions adapter.
//!
//! SSE format: `data: {"choices":[{"delta":{"content":"hi"}}]}\n\n`, terminated
//! by `data: [DONE]`.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{ConfigError, OpenRouterConfig};
use crate::error::RelayError;
use crate::relay::adapter::{send_streaming, with_idle_timeout, ByteStream, ChatAdapter, EventStream};
use crate::relay::types::{Backend, ChatRequest, Message, RelayEvent, Role};

pub struct OpenRouterAdapter {
    client: reqwest::Client,
    completions_url: String,
    model: String,
    referer: String,
    api_key: String,
    timeout: Duration,
}

/// Body of an OpenAI-compatible streaming chat completion request.
#[derive(Debug, Serialize)]
pub struct CompletionBody<'a> {
    pub model: &'a str,
    pub messages: Vec<Message>,
    pub stream: bool,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl OpenRouterAdapter {
    /// Fails when no credential is configured.
    pub fn new(client: reqwest::Client, config: &OpenRouterConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingCredential)?;

        Ok(Self {
            client,
            completions_url: config.completions_url.clone(),
            model: config.model.clone(),
            referer: config.referer.clone(),
            api_key,
            timeout: config.timeout(),
        })
    }

    /// The system prompt is prepended to the conversation as a `system` message.
    pub fn request_body<'a>(&'a self, request: &ChatRequest) -> CompletionBody<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(prompt) = request.system_prompt.as_deref().filter(|p| !p.is_empty()) {
            messages.push(Message::new(Role::System, prompt));
        }
        messages.extend(request.messages.iter().cloned());

        CompletionBody {
            model: &self.model,
            messages,
            stream: true,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl ChatAdapter for OpenRouterAdapter {
    fn backend(&self) -> Backend {
        Backend::OpenRouter
    }

    async fn open(&self, request: &ChatRequest) -> Result<EventStream, RelayError> {
        let builder = self
            .client
            .post(self.completions_url.as_str())
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", self.referer.as_str())
            .json(&self.request_body(request));

        let response = send_streaming(Backend::OpenRouter, builder, self.timeout).await?;
        Ok(decode_sse(with_idle_timeout(
            response.bytes_stream(),
            self.timeout,
        )))
    }
}

struct SseState {
    stream: ByteStream,
    buf: BytesMut,
    pending: VecDeque<RelayEvent>,
    finished: bool,
}

/// Decode an OpenRouter SSE byte stream into relay events.
pub(crate) fn decode_sse(byte_stream: ByteStream) -> EventStream {
    let state = SseState {
        stream: byte_stream,
        buf: BytesMut::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                return Some((event, st));
            }
            if st.finished {
                return None;
            }

            match st.stream.next().await {
                Some(Ok(chunk)) => {
                    st.buf.extend_from_slice(&chunk);
                    st.finished = drain_lines(&mut st.buf, &mut st.pending);
                }
                Some(Err(message)) => {
                    st.finished = true;
                    st.pending.push_back(RelayEvent::Error { message });
                }
                None => {
                    st.finished = true;
                    // A final line may arrive without its newline.
                    let rest = st.buf.split();
                    let terminated = match decode_line(&String::from_utf8_lossy(&rest)) {
                        Some(event) => {
                            let terminal = event.is_terminal();
                            st.pending.push_back(event);
                            terminal
                        }
                        None => false,
                    };
                    if !terminated {
                        st.pending.push_back(RelayEvent::error(
                            "upstream closed the stream before completion",
                        ));
                    }
                }
            }
        }
    })
    .boxed()
}

/// Decode every complete line in `buf`. Returns true once a terminal event is queued;
/// lines after it are left unread.
fn drain_lines(buf: &mut BytesMut, out: &mut VecDeque<RelayEvent>) -> bool {
    while let Some(end) = buf.iter().position(|&b| b == b'\n') {
        let line = buf.split_to(end + 1);
        if let Some(event) = decode_line(&String::from_utf8_lossy(&line)) {
            let terminal = event.is_terminal();
            out.push_back(event);
            if terminal {
                return true;
            }
        }
    }
    false
}

fn decode_line(line: &str) -> Option<RelayEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let data = line
        .strip_prefix("data:")
        .map(str::trim_start)
        .unwrap_or(line);
    if data == "[DONE]" {
        return Some(RelayEvent::Done);
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            debug!("Skipping non-JSON SSE line: {e}");
            return None;
        }
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Some(RelayEvent::error(format!("OpenRouter error: {message}")));
    }

    value["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|content| !content.is_empty())
        .map(RelayEvent::token)
}
