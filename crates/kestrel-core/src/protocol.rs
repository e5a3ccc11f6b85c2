//! Wire-protocol types and inbound message classification.
//!
//! Requests travel as `{id, function, data}`. Responses come back as
//! `{id, status: "success", data}` or `{id, status: "error", error}` and
//! correlate to exactly one prior request by id. Observable events carry
//! `{observable, data}` with no correlation id at all — a stream name may
//! produce unbounded events over time.
//!
//! Routing inspects the shape of a received value: anything with both `id`
//! and `status` is a response; anything with `observable` is an event;
//! everything else is a decode error the transport logs and skips.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::ClientError;
use crate::ids::RequestId;
use crate::payload::Payload;

/// A named remote function call.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionRequest {
    /// Correlation token, fresh per call.
    pub id: RequestId,
    /// Dotted function name (e.g. `nested.fn`).
    pub function: String,
    /// Call argument.
    pub data: Payload,
}

impl FunctionRequest {
    /// Build a request with a freshly generated id.
    #[must_use]
    pub fn new(function: impl Into<String>, data: Payload) -> Self {
        Self {
            id: RequestId::generate(),
            function: function.into(),
            data,
        }
    }

    /// Encode as a JSON wire value.
    ///
    /// Fails with [`ClientError::UnsupportedPayload`] for payload shapes the
    /// JSON wire cannot carry.
    pub fn to_wire(&self) -> Result<Value, ClientError> {
        Ok(json!({
            "id": self.id.as_str(),
            "function": self.function,
            "data": self.data.to_json_value()?,
        }))
    }
}

/// Error body reported by the remote side for a failed invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteErrorBody {
    /// Human-readable message.
    pub message: String,
    /// Optional machine-readable code.
    pub code: Option<String>,
}

/// Outcome of one remote function invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionResponse {
    /// The call succeeded.
    Success {
        /// Echoed request id.
        id: String,
        /// Result payload.
        data: Payload,
    },
    /// The remote side reported failure.
    Failure {
        /// Echoed request id.
        id: String,
        /// What went wrong.
        error: RemoteErrorBody,
    },
}

impl FunctionResponse {
    /// Build a success response.
    #[must_use]
    pub fn success(id: impl Into<String>, data: Payload) -> Self {
        Self::Success {
            id: id.into(),
            data,
        }
    }

    /// Build a failure response.
    #[must_use]
    pub fn failure(id: impl Into<String>, error: RemoteErrorBody) -> Self {
        Self::Failure {
            id: id.into(),
            error,
        }
    }

    /// The echoed request id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Success { id, .. } | Self::Failure { id, .. } => id,
        }
    }
}

/// A server-pushed event on a named stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservableEvent {
    /// Stream name, including the trailing `$` marker.
    pub observable: String,
    /// Event payload; null when the event carries no data.
    pub data: Payload,
}

/// Classification of a message received from the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// Correlates to a pending invocation.
    Response(FunctionResponse),
    /// Belongs to a named event stream.
    Event(ObservableEvent),
}

/// A received value that matches neither the response nor the event shape.
#[derive(Debug, thiserror::Error)]
#[error("undecodable wire message: {message}")]
pub struct DecodeError {
    /// What was wrong with the value.
    pub message: String,
}

impl DecodeError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Inbound {
    /// Classify a received JSON value by shape.
    pub fn from_wire(value: Value) -> Result<Self, DecodeError> {
        let Value::Object(mut obj) = value else {
            return Err(DecodeError::new("not a JSON object"));
        };

        if obj.contains_key("id") && obj.contains_key("status") {
            let id = obj
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| DecodeError::new("response id is not a string"))?
                .to_owned();
            let status = obj
                .get("status")
                .and_then(Value::as_str)
                .ok_or_else(|| DecodeError::new("response status is not a string"))?
                .to_owned();
            return match status.as_str() {
                "success" => {
                    let data = obj.remove("data").unwrap_or(Value::Null);
                    Ok(Self::Response(FunctionResponse::success(
                        id,
                        Payload::Json(data),
                    )))
                }
                "error" => {
                    let error = obj
                        .remove("error")
                        .ok_or_else(|| DecodeError::new("error response without error body"))?;
                    let error: RemoteErrorBody = serde_json::from_value(error)
                        .map_err(|e| DecodeError::new(format!("malformed error body: {e}")))?;
                    Ok(Self::Response(FunctionResponse::failure(id, error)))
                }
                other => Err(DecodeError::new(format!("unknown status `{other}`"))),
            };
        }

        if let Some(observable) = obj.get("observable").and_then(Value::as_str) {
            let observable = observable.to_owned();
            let data = obj.remove("data").unwrap_or(Value::Null);
            return Ok(Self::Event(ObservableEvent {
                observable,
                data: Payload::Json(data),
            }));
        }

        Err(DecodeError::new(
            "neither a response (id + status) nor an event (observable)",
        ))
    }
}
