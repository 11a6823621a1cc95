//! Client-facing output frames.
//!
//! Every frame is a single `data: <payload>\n\n` block:
//! - token: `{"text": "..."}`
//! - done:  `[DONE]`
//! - error: `{"error": "..."}`

use std::convert::Infallible;

use axum::response::sse::Event;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;

use crate::relay::types::RelayEvent;

pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Serialize)]
struct TextPayload<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    error: &'a str,
}

/// Build the SSE event for one relay event.
pub fn encode(event: &RelayEvent) -> Event {
    let payload = match event {
        RelayEvent::Token { text } => serde_json::to_string(&TextPayload { text }),
        RelayEvent::Error { message } => serde_json::to_string(&ErrorPayload { error: message }),
        RelayEvent::Done => return Event::default().data(DONE_SENTINEL),
    };
    Event::default().data(payload.unwrap_or_default())
}

/// Encode events one by one, in production order.
pub fn encode_stream<S>(events: S) -> impl Stream<Item = Result<Event, Infallible>>
where
    S: Stream<Item = RelayEvent>,
{
    events.map(|event| Ok(encode(&event)))
}
