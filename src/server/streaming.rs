//! SSE (Server-Sent Events) streaming for token-by-token responses.
//!
//! Turns a relay event stream into a chunked `text/event-stream` response.
//! Frames are written as soon as the adapter yields them.

use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::metrics::RelayMetrics;
use crate::relay::frame;
use crate::relay::{Backend, EventStream, RelayEvent};

/// Per-request details carried into the stream for logging and metrics.
pub struct StreamContext {
    pub request_id: String,
    pub backend: Backend,
    pub metrics: RelayMetrics,
}

/// Build the streaming response for an opened relay.
pub fn event_stream_response(events: EventStream, ctx: StreamContext) -> Response {
    let mut tokens = 0usize;

    let observed = events.map(move |event| {
        match &event {
            RelayEvent::Token { .. } => {
                tokens += 1;
                ctx.metrics.record_token(ctx.backend);
            }
            RelayEvent::Done => {
                ctx.metrics.record_completed(ctx.backend);
                info!(
                    request_id = %ctx.request_id,
                    backend = %ctx.backend,
                    tokens,
                    "Stream complete"
                );
            }
            RelayEvent::Error { message } => {
                ctx.metrics.record_upstream_error(ctx.backend, "stream");
                warn!(
                    request_id = %ctx.request_id,
                    backend = %ctx.backend,
                    tokens,
                    "Stream aborted: {message}"
                );
            }
        }
        event
    });

    // No keep-alive: the body is exactly the concatenated frames.
    Sse::new(frame::encode_stream(observed)).into_response()
}
