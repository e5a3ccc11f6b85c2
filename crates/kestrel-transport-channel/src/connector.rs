//! Message-channel connector binding.
//!
//! Connect sequence: ask the host to subscribe, then wait for the context
//! message tagged [`CONNECT_SENTINEL`] carrying the dedicated port. All
//! further traffic flows over that port as JSON text frames — requests out,
//! responses and observable events in. Binary payloads cannot ride a text
//! frame and are rejected before anything is sent.

use std::sync::Arc;

use async_trait::async_trait;
use kestrel_client::hub::EventHub;
use kestrel_client::relay::relay;
use kestrel_client::router::{Router, await_response};
use kestrel_client::Connector;
use kestrel_core::protocol::{FunctionRequest, FunctionResponse, Inbound};
use kestrel_core::ClientError;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::port::{ChannelHost, HostMessage, MessagePort, CONNECT_SENTINEL};

/// Default base locator for user resources in the hosted context.
const DEFAULT_USER_URL: &str = "https://kestrel/__user__/";

/// Message-channel connector configuration.
#[derive(Clone, Debug, Default)]
pub struct ChannelConnectorConfig {
    /// Base locator for [`Connector::url`] resolution; defaults to
    /// `https://kestrel/__user__/`.
    pub user_url: Option<String>,
}

struct Active {
    port: Arc<MessagePort>,
    reader: JoinHandle<()>,
}

/// [`Connector`] bound to an in-process message channel.
pub struct ChannelConnector {
    config: ChannelConnectorConfig,
    host: Arc<dyn ChannelHost>,
    router: Arc<Router>,
    active: Mutex<Option<Active>>,
}

impl ChannelConnector {
    /// Create a connector over the given host capability.
    #[must_use]
    pub fn new(config: ChannelConnectorConfig, host: Arc<dyn ChannelHost>) -> Self {
        Self {
            config,
            host,
            router: Arc::new(Router::new()),
            active: Mutex::new(None),
        }
    }

    /// Wait for the host's port-transfer message.
    ///
    /// The listener settles a relay with the dedicated port, or with a
    /// handshake error when the context stream ends first. Context messages
    /// with any other tag are ignored.
    async fn await_port_transfer(
        mut context: tokio::sync::mpsc::UnboundedReceiver<HostMessage>,
    ) -> Result<MessagePort, ClientError> {
        let (settler, collector) = relay();
        let listener = tokio::spawn(async move {
            let mut settler = Some(settler);
            while let Some(message) = context.recv().await {
                if message.tag == CONNECT_SENTINEL {
                    match message.port {
                        Some(port) => {
                            if let Some(settler) = settler.take() {
                                settler.settle(Ok(port));
                            }
                            break;
                        }
                        None => warn!("port transfer message without a port"),
                    }
                } else {
                    debug!(tag = %message.tag, "unexpected context message");
                }
            }
            if let Some(settler) = settler.take() {
                settler.settle(Err(ClientError::handshake(
                    "context stream ended before port transfer",
                )));
            }
        });

        let outcome = collector
            .collect()
            .await
            .unwrap_or_else(|| Err(ClientError::handshake("handshake listener went away")));
        listener.abort();
        outcome
    }

    /// Spawn the read loop routing inbound frames.
    fn spawn_reader(
        router: Arc<Router>,
        mut frames: tokio::sync::mpsc::UnboundedReceiver<String>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                let value: Value = match serde_json::from_str(&frame) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(error = %err, "discarding non-JSON frame");
                        continue;
                    }
                };
                match Inbound::from_wire(value) {
                    Ok(inbound) => router.route(inbound),
                    Err(err) => warn!(error = %err, "discarding unroutable frame"),
                }
            }
            debug!("message port closed");
        })
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    #[instrument(skip_all)]
    async fn connect(&self, events: EventHub) -> Result<(), ClientError> {
        if self.active.lock().is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        debug!("initiating subscription");
        let context = self.host.subscribe().await?;
        let port = Self::await_port_transfer(context).await?;

        let Some(frames) = port.take_receiver() else {
            return Err(ClientError::handshake("transferred port was already consumed"));
        };

        self.router.bind(events);
        let reader = Self::spawn_reader(Arc::clone(&self.router), frames);
        *self.active.lock() = Some(Active {
            port: Arc::new(port),
            reader,
        });
        debug!("connection established");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn disconnect(&self) -> Result<(), ClientError> {
        let Some(active) = self.active.lock().take() else {
            return Err(ClientError::NotConnected);
        };
        active.reader.abort();
        self.router.unbind();
        let abandoned = self.router.abandon_all();
        debug!(abandoned, "disconnected");
        Ok(())
    }

    async fn invoke(&self, request: FunctionRequest) -> Result<FunctionResponse, ClientError> {
        let port = {
            let active = self.active.lock();
            let active = active.as_ref().ok_or(ClientError::NotConnected)?;
            Arc::clone(&active.port)
        };

        // Binary payloads cannot ride a JSON text frame; fail before any
        // frame is sent or any entry is registered.
        let frame = request
            .to_wire()
            .map_err(|err| match err {
                ClientError::UnsupportedPayload { .. } => ClientError::UnsupportedPayload {
                    message: "binary payload is not supported on the message-channel transport"
                        .to_owned(),
                },
                other => other,
            })?
            .to_string();

        let collector = self.router.register(&request.id);
        debug!(id = %request.id, function = %request.function, "sending request frame");
        if let Err(err) = port.send(frame) {
            self.router.forget(&request.id);
            return Err(err);
        }
        Ok(await_response(collector).await)
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.config.user_url.as_deref().unwrap_or(DEFAULT_USER_URL);
        Ok(Url::parse(base)?.join(path)?)
    }
}
