//! Opaque call, response, and event data.
//!
//! A [`Payload`] is what a remote function receives and returns, and what an
//! event stream carries. The client never interprets it — only the wire
//! codecs care about its shape, and not every transport can carry every
//! shape (the message-channel transport rejects binary payloads).

use bytes::Bytes;
use serde_json::Value;

use crate::errors::ClientError;

/// Opaque data attached to a request, response, or event.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Plain text.
    Text(String),
    /// Structured JSON data.
    Json(Value),
    /// Raw bytes.
    Binary(Bytes),
}

impl Payload {
    /// The null payload (an event with an empty body, a function called
    /// without an argument).
    #[must_use]
    pub fn null() -> Self {
        Self::Json(Value::Null)
    }

    /// Whether the payload contains no data: the empty string, the empty
    /// byte buffer, or JSON null.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Json(v) => v.is_null(),
            Self::Binary(b) => b.is_empty(),
        }
    }

    /// Text view of the payload, for both `Text` and JSON string payloads.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The JSON value, if this is a JSON payload.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The raw bytes, if this is a binary payload.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Convert to a JSON wire value.
    ///
    /// Binary payloads have no JSON representation; transports that carry
    /// requests as JSON text call this before sending and fail fast.
    pub fn to_json_value(&self) -> Result<Value, ClientError> {
        match self {
            Self::Text(s) => Ok(Value::String(s.clone())),
            Self::Json(v) => Ok(v.clone()),
            Self::Binary(_) => Err(ClientError::UnsupportedPayload {
                message: "binary payload is not representable as JSON text".to_owned(),
            }),
        }
    }

    /// Consume the payload into a raw byte body.
    ///
    /// Text becomes UTF-8, JSON is serialized, binary passes through.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(s) => Bytes::from(s),
            Self::Json(v) => Bytes::from(serde_json::to_vec(&v).unwrap_or_default()),
            Self::Binary(b) => b,
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Self::Binary(b)
    }
}
