//! The adapter seam between the relay and a concrete backend.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::relay::types::{Backend, ChatRequest, RelayEvent};

/// Lazily produced events for one request. Dropping it releases the upstream connection.
pub type EventStream = Pin<Box<dyn Stream<Item = RelayEvent> + Send>>;

/// Upstream bytes with transport failures flattened to a message.
pub(crate) type ByteStream = BoxStream<'static, Result<Bytes, String>>;

/// One backend's wire protocol.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    fn backend(&self) -> Backend;

    /// Open the upstream stream for `request`.
    ///
    /// Returns an error only for failures known before any body bytes are
    /// read: connect errors, non-2xx statuses, a missing response. Anything
    /// later is reported in-band as a terminal [`RelayEvent::Error`].
    async fn open(&self, request: &ChatRequest) -> Result<EventStream, RelayError>;
}

/// Send a streaming request and check its status before any body is read.
pub(crate) async fn send_streaming(
    backend: Backend,
    request: reqwest::RequestBuilder,
    budget: Duration,
) -> Result<reqwest::Response, RelayError> {
    let secs = budget.as_secs();
    let response = match tokio::time::timeout(budget, request.send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(RelayError::from_send(backend, secs, e)),
        Err(_) => return Err(RelayError::Timeout { backend, secs }),
    };

    let status = response.status();
    if !status.is_success() {
        let body = match tokio::time::timeout(budget, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                warn!(backend = %backend, "Failed to read upstream error body: {e}");
                String::new()
            }
            Err(_) => {
                warn!(
                    backend = %backend,
                    status = status.as_u16(),
                    "Timed out reading upstream error body after {secs}s"
                );
                String::new()
            }
        };
        return Err(RelayError::UpstreamStatus {
            backend,
            status: status.as_u16(),
            body,
        });
    }

    debug!(backend = %backend, status = status.as_u16(), "Upstream stream opened");
    Ok(response)
}

/// Bound every wait for the next upstream chunk by `budget`.
///
/// A stall or transport error is yielded once as `Err` and ends the stream.
pub(crate) fn with_idle_timeout<S, E>(byte_stream: S, budget: Duration) -> ByteStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display,
{
    let inner = byte_stream
        .map(|chunk| chunk.map_err(|e| e.to_string()))
        .boxed();

    stream::unfold(Some(inner), move |state| async move {
        let mut inner = state?;
        match tokio::time::timeout(budget, inner.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(inner))),
            Ok(Some(Err(e))) => Some((Err(format!("upstream connection failed: {e}")), None)),
            Ok(None) => None,
            Err(_) => Some((
                Err(format!(
                    "upstream stalled for more than {}s",
                    budget.as_secs_f64()
                )),
                None,
            )),
        }
    })
    .boxed()
}
