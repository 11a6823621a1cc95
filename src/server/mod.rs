//! HTTP gateway in front of the relay.
//!
//! - [`api`]: Route handlers, shared state and JSON error responses
//! - [`streaming`]: `text/event-stream` responses built from relay events

pub mod api;
pub mod streaming;
