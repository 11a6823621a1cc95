//! Ollama `/api/chat` adapter.
//!
//! Ollama streams one JSON object per message, usually newline-terminated but
//! not guaranteed to line up with transport chunks. The decoder buffers bytes
//! and pulls complete JSON values off the front, skipping anything that is not
//! valid JSON. When the upstream closes normally a `Done` event always follows.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::OllamaConfig;
use crate::error::RelayError;
use crate::relay::adapter::{send_streaming, with_idle_timeout, ByteStream, ChatAdapter, EventStream};
use crate::relay::types::{Backend, ChatRequest, Message, RelayEvent};

pub struct OllamaAdapter {
    client: reqwest::Client,
    chat_url: String,
    model: String,
    timeout: Duration,
}

/// Body of an Ollama streaming chat request.
#[derive(Debug, Serialize)]
pub struct OllamaChatBody<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
    pub options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct OllamaOptions {
    pub temperature: f64,
    pub num_predict: u32,
}

impl OllamaAdapter {
    pub fn new(client: reqwest::Client, config: &OllamaConfig) -> Self {
        Self {
            client,
            chat_url: config.chat_url(),
            model: config.model.clone(),
            timeout: config.timeout(),
        }
    }

    /// The system prompt travels as a top-level field, not as a message.
    pub fn request_body<'a>(&'a self, request: &'a ChatRequest) -> OllamaChatBody<'a> {
        OllamaChatBody {
            model: &self.model,
            messages: &request.messages,
            stream: true,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            system: request.system_prompt.as_deref().filter(|p| !p.is_empty()),
        }
    }
}

#[async_trait]
impl ChatAdapter for OllamaAdapter {
    fn backend(&self) -> Backend {
        Backend::Ollama
    }

    async fn open(&self, request: &ChatRequest) -> Result<EventStream, RelayError> {
        let builder = self
            .client
            .post(self.chat_url.as_str())
            .json(&self.request_body(request));

        let response = send_streaming(Backend::Ollama, builder, self.timeout).await?;
        Ok(decode_ndjson(with_idle_timeout(
            response.bytes_stream(),
            self.timeout,
        )))
    }
}

struct NdjsonState {
    stream: ByteStream,
    buf: BytesMut,
    pending: VecDeque<RelayEvent>,
    finished: bool,
}

/// Decode an Ollama byte stream into relay events.
pub(crate) fn decode_ndjson(byte_stream: ByteStream) -> EventStream {
    let state = NdjsonState {
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
                    st.finished = drain_objects(&mut st.buf, &mut st.pending, false);
                }
                Some(Err(message)) => {
                    st.finished = true;
                    st.pending.push_back(RelayEvent::Error { message });
                }
                None => {
                    st.finished = true;
                    if !drain_objects(&mut st.buf, &mut st.pending, true) {
                        st.pending.push_back(RelayEvent::Done);
                    }
                }
            }
        }
    })
    .boxed()
}

/// Pull every complete JSON value off the front of `buf`.
///
/// Returns true once a terminal event has been queued. An incomplete value is
/// left in the buffer unless `at_eof` is set.
fn drain_objects(buf: &mut BytesMut, out: &mut VecDeque<RelayEvent>, at_eof: bool) -> bool {
    loop {
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(start) => {
                let _ = buf.split_to(start);
            }
            None => {
                buf.clear();
                return false;
            }
        }

        let (parsed, consumed) = {
            let mut values = serde_json::Deserializer::from_slice(&buf[..]).into_iter::<Value>();
            let parsed = values.next();
            (parsed, values.byte_offset())
        };

        match parsed {
            Some(Ok(value)) => {
                let _ = buf.split_to(consumed);
                if let Some(event) = event_from_object(&value) {
                    let terminal = event.is_terminal();
                    out.push_back(event);
                    if terminal {
                        return true;
                    }
                }
            }
            Some(Err(e)) if e.is_eof() && !at_eof => return false,
            Some(Err(e)) => {
                debug!("Skipping malformed Ollama chunk: {e}");
                skip_malformed(buf);
            }
            None => return false,
        }
    }
}

/// Drop bytes up to the next line break or object start.
fn skip_malformed(buf: &mut BytesMut) {
    let resume = buf
        .iter()
        .skip(1)
        .position(|&b| b == b'\n' || b == b'{')
        .map(|i| i + 1);
    match resume {
        Some(i) => {
            let _ = buf.split_to(i);
        }
        None => buf.clear(),
    }
}

fn event_from_object(value: &Value) -> Option<RelayEvent> {
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Some(RelayEvent::error(format!("Ollama error: {message}")));
    }
    value
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(RelayEvent::token)
}
