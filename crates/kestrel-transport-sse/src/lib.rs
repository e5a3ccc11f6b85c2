//! # kestrel-transport-sse
//!
//! HTTP-invoke / server-push transport binding for the Kestrel client.
//!
//! One long-lived SSE stream delivers all server-initiated events as
//! `<observable>$<payload>` lines; each invocation travels as an
//! independent `POST invoke/{function}` request whose response body is
//! decoded per its advertised content type (JSON, plain text, or raw
//! bytes).

#![deny(unsafe_code)]

pub mod connector;
pub mod push;

pub use connector::{SseConnector, SseConnectorConfig};
pub use push::{STREAM_DELIMITER, decode_push_line};
