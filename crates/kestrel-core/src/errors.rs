//! Client error taxonomy.
//!
//! Connection-lifecycle errors reject the call immediately at the facade
//! boundary. Remote-reported failures surface on the specific invocation
//! only — they never affect other pending invocations or the connection.
//! Malformed inbound messages and responses with no matching invocation are
//! logged, never raised.

use crate::protocol::RemoteErrorBody;

/// Errors surfaced by the Kestrel client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Operation attempted outside the Connected state.
    #[error("client is not connected")]
    NotConnected,

    /// A `connect()` call raced another connect already in flight.
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    /// `connect()` called while a connection is already established.
    #[error("client is already connected")]
    AlreadyConnected,

    /// The transport handshake did not complete.
    #[error("handshake failed: {message}")]
    Handshake {
        /// What went wrong during connect.
        message: String,
    },

    /// The target name does not resolve to a callable function.
    #[error("`{name}` is not a remote function")]
    BadInvocation {
        /// The offending endpoint name.
        name: String,
    },

    /// The remote side reported failure for this invocation.
    #[error("{message}")]
    Remote {
        /// Remote-supplied message.
        message: String,
        /// Optional machine-readable code.
        code: Option<String>,
    },

    /// The payload shape cannot be carried by this transport.
    #[error("{message}")]
    UnsupportedPayload {
        /// Why the payload was rejected.
        message: String,
    },

    /// A publish found the subscriber's slot still occupied.
    #[error("subscriber of `{observable}` has not collected the previous value")]
    SlowConsumer {
        /// The stream whose subscriber fell behind.
        observable: String,
    },

    /// Resource-locator resolution failed.
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    /// Typed error for a remote-reported failure body.
    #[must_use]
    pub fn remote(error: RemoteErrorBody) -> Self {
        Self::Remote {
            message: error.message,
            code: error.code,
        }
    }

    /// Handshake failure with the given cause.
    #[must_use]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn remote_carries_message_and_code() {
        let err = ClientError::remote(RemoteErrorBody {
            message: "no such session".into(),
            code: Some("SESSION_NOT_FOUND".into()),
        });
        assert_eq!(err.to_string(), "no such session");
        assert_matches!(err, ClientError::Remote { code: Some(c), .. } if c == "SESSION_NOT_FOUND");
    }

    #[test]
    fn remote_without_code() {
        let err = ClientError::remote(RemoteErrorBody {
            message: "boom".into(),
            code: None,
        });
        assert_matches!(err, ClientError::Remote { code: None, .. });
    }

    #[test]
    fn handshake_message() {
        let err = ClientError::handshake("subscribe returned 503");
        assert_eq!(err.to_string(), "handshake failed: subscribe returned 503");
    }

    #[test]
    fn bad_invocation_names_the_endpoint() {
        let err = ClientError::BadInvocation { name: "evt$".into() };
        assert_eq!(err.to_string(), "`evt$` is not a remote function");
    }

    #[test]
    fn invalid_url_converts() {
        let parse_err = url::Url::parse("::not a url::").unwrap_err();
        let err: ClientError = parse_err.into();
        assert_matches!(err, ClientError::InvalidUrl(_));
    }
}
