//! The transport-facing connector abstraction.
//!
//! A connector owns one underlying transport and translates the facade's
//! intent — connect, disconnect, invoke-by-name, resolve a path — into wire
//! operations. Exactly one connector is active per client at a time; which
//! binding to use is an injected construction-time choice, never sniffed
//! from the environment.

use async_trait::async_trait;
use kestrel_core::protocol::{FunctionRequest, FunctionResponse};
use kestrel_core::ClientError;
use url::Url;

use crate::hub::EventHub;

/// One transport binding.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish the transport and start routing inbound events into
    /// `events`.
    ///
    /// Fails with [`ClientError::Handshake`] when the handshake does not
    /// complete. There is no built-in handshake timeout; callers wanting one
    /// race this future against a timer. Calling while already connected is
    /// a caller error.
    async fn connect(&self, events: EventHub) -> Result<(), ClientError>;

    /// Tear down the transport.
    ///
    /// Safe to call with invocations still pending: those are abandoned,
    /// never resolved nor rejected.
    async fn disconnect(&self) -> Result<(), ClientError>;

    /// Send a request and suspend until the matching response is routed
    /// back.
    ///
    /// Fails with [`ClientError::NotConnected`] when no connection is
    /// established. A remote-reported failure is an `Ok` value carrying
    /// [`FunctionResponse::Failure`] — the facade turns it into a typed
    /// error.
    async fn invoke(&self, request: FunctionRequest) -> Result<FunctionResponse, ClientError>;

    /// Resolve a relative path against the connector's base locator.
    ///
    /// Purely a string/URL operation; no I/O.
    fn url(&self, path: &str) -> Result<Url, ClientError>;
}
