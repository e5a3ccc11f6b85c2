//! The public client facade.
//!
//! A [`Client`] owns exactly one connector and one event hub, and mediates
//! every call through them. Remote endpoints are addressed by dotted name;
//! names carrying the trailing `$` marker denote event streams, everything
//! else denotes a callable function. The facade hands out stable cached
//! [`FunctionHandle`]s for functions and a fresh [`Subscription`] per
//! request for streams — the underlying broadcast feed is shared either way.

use std::collections::HashMap;
use std::sync::Arc;

use kestrel_core::protocol::{FunctionRequest, FunctionResponse};
use kestrel_core::{ClientError, Payload};
use parking_lot::Mutex;
use tracing::{debug, instrument};
use url::Url;

use crate::connector::Connector;
use crate::hub::{EventHub, Subscription};

/// Suffix marking a name as an event stream rather than a function.
pub const STREAM_MARKER: char = '$';

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Disconnected,
    Connecting,
    Connected,
}

struct Shared {
    connector: Arc<dyn Connector>,
    state: Mutex<State>,
    events: EventHub,
}

impl Shared {
    fn ensure_connected(&self) -> Result<(), ClientError> {
        if *self.state.lock() == State::Connected {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }
}

/// A remote endpoint handle returned by [`Client::get`].
#[derive(Debug)]
pub enum Endpoint {
    /// A callable remote function.
    Function(FunctionHandle),
    /// An independent subscription to a remote event stream.
    Stream(Subscription),
}

/// A stable, cloneable handle to one named remote function.
#[derive(Clone)]
pub struct FunctionHandle {
    name: String,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FunctionHandle {
    /// The dotted function name this handle invokes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the remote function.
    ///
    /// Fails with [`ClientError::NotConnected`] outside the Connected state
    /// (before any transport I/O) and with [`ClientError::Remote`] when the
    /// remote side reports failure for this invocation.
    pub async fn call(&self, data: impl Into<Payload> + Send) -> Result<Payload, ClientError> {
        self.shared.ensure_connected()?;
        let request = FunctionRequest::new(&self.name, data.into());
        debug!(id = %request.id, function = %request.function, "invoking remote function");
        match self.shared.connector.invoke(request).await? {
            FunctionResponse::Success { data, .. } => Ok(data),
            FunctionResponse::Failure { error, .. } => Err(ClientError::remote(error)),
        }
    }
}

/// RPC client facade over one connector.
pub struct Client {
    shared: Arc<Shared>,
    functions: Mutex<HashMap<String, FunctionHandle>>,
}

impl Client {
    /// Create a client over the given transport binding.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                state: Mutex::new(State::Disconnected),
                events: EventHub::new(),
            }),
            functions: Mutex::new(HashMap::new()),
        }
    }

    /// Connect to the remote interface.
    ///
    /// Fails with [`ClientError::AlreadyConnecting`] when another connect is
    /// in flight and [`ClientError::AlreadyConnected`] in the Connected
    /// state; a handshake failure leaves the client Disconnected.
    #[instrument(skip_all)]
    pub async fn connect(&self) -> Result<(), ClientError> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                State::Disconnected => *state = State::Connecting,
                State::Connecting => return Err(ClientError::AlreadyConnecting),
                State::Connected => return Err(ClientError::AlreadyConnected),
            }
        }

        match self
            .shared
            .connector
            .connect(self.shared.events.clone())
            .await
        {
            Ok(()) => {
                *self.shared.state.lock() = State::Connected;
                debug!("connected");
                Ok(())
            }
            Err(err) => {
                *self.shared.state.lock() = State::Disconnected;
                Err(err)
            }
        }
    }

    /// Disconnect from the remote interface.
    ///
    /// Pending invocations are abandoned by the connector; live
    /// subscriptions survive and resume receiving events after the next
    /// connect.
    #[instrument(skip_all)]
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        {
            let mut state = self.shared.state.lock();
            if *state != State::Connected {
                return Err(ClientError::NotConnected);
            }
            // Flip first so new invokes fail fast during teardown.
            *state = State::Disconnected;
        }
        self.shared.connector.disconnect().await?;
        debug!("disconnected");
        Ok(())
    }

    /// Whether the client is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.shared.state.lock() == State::Connected
    }

    /// Get a handle to a remote endpoint by name.
    ///
    /// Function names resolve to a stable handle — repeated calls return
    /// clones of the same cached handle. Stream names (trailing
    /// [`STREAM_MARKER`]) resolve to a fresh independent subscription on
    /// every call.
    pub fn get(&self, name: &str) -> Endpoint {
        if name.ends_with(STREAM_MARKER) {
            return Endpoint::Stream(self.shared.events.subscribe(name));
        }

        let mut functions = self.functions.lock();
        let handle = functions
            .entry(name.to_owned())
            .or_insert_with(|| FunctionHandle {
                name: name.to_owned(),
                shared: Arc::clone(&self.shared),
            });
        Endpoint::Function(handle.clone())
    }

    /// Invoke a remote function by name.
    ///
    /// Sugar for [`Client::get`] followed by a call. Fails with
    /// [`ClientError::BadInvocation`] when the name resolves to a stream.
    pub async fn invoke(
        &self,
        name: &str,
        data: impl Into<Payload> + Send,
    ) -> Result<Payload, ClientError> {
        match self.get(name) {
            Endpoint::Function(function) => function.call(data).await,
            Endpoint::Stream(_) => Err(ClientError::BadInvocation {
                name: name.to_owned(),
            }),
        }
    }

    /// Subscribe to a remote event stream by name.
    ///
    /// Fails with [`ClientError::BadInvocation`] when the name lacks the
    /// stream marker and [`ClientError::NotConnected`] outside the
    /// Connected state.
    pub fn subscribe(&self, name: &str) -> Result<Subscription, ClientError> {
        self.shared.ensure_connected()?;
        if name.ends_with(STREAM_MARKER) {
            Ok(self.shared.events.subscribe(name))
        } else {
            Err(ClientError::BadInvocation {
                name: name.to_owned(),
            })
        }
    }

    /// Resolve a path within the remote context to an absolute URL.
    ///
    /// Leading slashes are stripped before resolution; no I/O happens.
    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.shared.ensure_connected()?;
        self.shared.connector.url(path.trim_start_matches('/'))
    }
}
