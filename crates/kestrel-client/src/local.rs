//! In-process connector for tests and host-less wiring.
//!
//! [`LocalConnector`] dispatches invocations straight to registered async
//! handlers instead of a wire transport, and lets the "host" side push
//! events with [`LocalConnector::emit`]. The facade sees the same
//! semantics as over a real transport: unknown names fail, handler errors
//! come back as remote failures, events fan out through the shared hub.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use kestrel_core::protocol::{FunctionRequest, FunctionResponse, ObservableEvent, RemoteErrorBody};
use kestrel_core::{ClientError, Payload};
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

use crate::connector::Connector;
use crate::hub::EventHub;

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Payload, RemoteErrorBody>> + Send>>;
type Handler = Box<dyn Fn(Payload) -> HandlerFuture + Send + Sync>;

/// Registry mapping dotted endpoint names to async handlers.
#[derive(Default)]
pub struct LocalInterface {
    handlers: HashMap<String, Handler>,
}

impl LocalInterface {
    /// Create an empty interface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async function handler under `name`.
    #[must_use]
    pub fn function<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, RemoteErrorBody>> + Send + 'static,
    {
        let boxed = move |data: Payload| -> HandlerFuture { Box::pin(handler(data)) };
        let _ = self.handlers.insert(name.to_owned(), Box::new(boxed));
        self
    }
}

#[derive(Default)]
struct LocalState {
    connected: bool,
    events: Option<EventHub>,
}

/// Base locator for paths resolved by the local connector.
const LOCAL_USER_URL: &str = "local:///__user__/";

/// A [`Connector`] backed by in-process handlers.
pub struct LocalConnector {
    interface: LocalInterface,
    state: Mutex<LocalState>,
}

impl LocalConnector {
    /// Create a connector over the given interface.
    #[must_use]
    pub fn new(interface: LocalInterface) -> Self {
        Self {
            interface,
            state: Mutex::new(LocalState::default()),
        }
    }

    /// Push an event into the bound hub, standing in for a host-initiated
    /// push.
    pub fn emit(&self, observable: &str, data: Payload) -> Result<(), ClientError> {
        let state = self.state.lock();
        let hub = state.events.as_ref().ok_or(ClientError::NotConnected)?;
        hub.publish(&ObservableEvent {
            observable: observable.to_owned(),
            data,
        });
        Ok(())
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(&self, events: EventHub) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        if state.connected {
            return Err(ClientError::AlreadyConnected);
        }
        state.connected = true;
        state.events = Some(events);
        debug!("local connector connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(ClientError::NotConnected);
        }
        state.connected = false;
        state.events = None;
        debug!("local connector disconnected");
        Ok(())
    }

    async fn invoke(&self, request: FunctionRequest) -> Result<FunctionResponse, ClientError> {
        if !self.state.lock().connected {
            return Err(ClientError::NotConnected);
        }
        let Some(handler) = self.interface.handlers.get(&request.function) else {
            return Err(ClientError::BadInvocation {
                name: request.function,
            });
        };
        let response = match handler(request.data).await {
            Ok(data) => FunctionResponse::success(request.id.as_str(), data),
            Err(error) => FunctionResponse::failure(request.id.as_str(), error),
        };
        Ok(response)
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(Url::parse(LOCAL_USER_URL)?.join(path)?)
    }
}
