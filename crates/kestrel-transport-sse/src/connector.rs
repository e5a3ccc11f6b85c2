//! HTTP-invoke / server-push connector binding.
//!
//! Receiving and sending are split across two channels: one long-lived SSE
//! stream carries all server-initiated events, while each invocation is an
//! independent `POST invoke/{function}` request. The HTTP response is fed
//! through the shared router exactly like a channel-transport response, so
//! correlation behaves identically on both bindings.

use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use kestrel_client::hub::EventHub;
use kestrel_client::router::{Router, await_response};
use kestrel_client::Connector;
use kestrel_core::protocol::{
    FunctionRequest, FunctionResponse, Inbound, RemoteErrorBody,
};
use kestrel_core::{ClientError, Payload};
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};
use url::Url;

use crate::push::decode_push_line;

/// Default base locator for the RPC surface.
const DEFAULT_RPC_URL: &str = "https://kestrel/__rpc__/";
/// Default base locator for user resources.
const DEFAULT_USER_URL: &str = "https://kestrel/__user__/";

/// HTTP/SSE connector configuration.
#[derive(Clone, Debug, Default)]
pub struct SseConnectorConfig {
    /// Base locator for `subscribe` and `invoke/{function}`; defaults to
    /// `https://kestrel/__rpc__/`.
    pub rpc_url: Option<String>,
    /// Base locator for [`Connector::url`] resolution; defaults to
    /// `https://kestrel/__user__/`.
    pub user_url: Option<String>,
}

impl SseConnectorConfig {
    /// Config pointing both surfaces at one host base.
    #[must_use]
    pub fn with_rpc_url(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: Some(rpc_url.into()),
            user_url: None,
        }
    }
}

struct Active {
    reader: JoinHandle<()>,
}

/// [`Connector`] bound to an HTTP invoke surface plus one SSE push channel.
pub struct SseConnector {
    config: SseConnectorConfig,
    http: reqwest::Client,
    router: Arc<Router>,
    active: Mutex<Option<Active>>,
}

impl SseConnector {
    /// Create a connector with a fresh HTTP client.
    #[must_use]
    pub fn new(config: SseConnectorConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a connector with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: SseConnectorConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            router: Arc::new(Router::new()),
            active: Mutex::new(None),
        }
    }

    fn rpc_url(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.config.rpc_url.as_deref().unwrap_or(DEFAULT_RPC_URL);
        Ok(Url::parse(base)?.join(path)?)
    }

    /// Decode a successful invoke response body per its content descriptor.
    async fn decode_body(response: reqwest::Response) -> Result<Payload, reqwest::Error> {
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_owned();

        match mime.as_str() {
            "application/json" => {
                let value = response.json().await?;
                Ok(Payload::Json(value))
            }
            "text/plain" => Ok(Payload::Text(response.text().await?)),
            _ => Ok(Payload::Binary(response.bytes().await?)),
        }
    }

    /// Perform the invoke request and shape its outcome as a response.
    ///
    /// Transport-level failures become `Failure` responses rather than
    /// call-site errors, mirroring how a pushed error response would look.
    async fn perform_invoke(&self, request: &FunctionRequest) -> FunctionResponse {
        let id = request.id.as_str().to_owned();

        let url = match self.rpc_url(&format!("invoke/{}", request.function)) {
            Ok(url) => url,
            Err(err) => {
                return FunctionResponse::failure(
                    id,
                    RemoteErrorBody {
                        message: err.to_string(),
                        code: None,
                    },
                );
            }
        };

        let sent = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(request.data.clone().into_bytes())
            .send()
            .await;

        match sent {
            Ok(response) if response.status().is_success() => {
                match Self::decode_body(response).await {
                    Ok(data) => FunctionResponse::success(id, data),
                    Err(err) => FunctionResponse::failure(
                        id,
                        RemoteErrorBody {
                            message: err.to_string(),
                            code: None,
                        },
                    ),
                }
            }
            Ok(response) => {
                let status = response.status();
                let error = match response.json::<RemoteErrorBody>().await {
                    Ok(body) => body,
                    Err(_) => RemoteErrorBody {
                        message: format!("invoke returned {status}"),
                        code: None,
                    },
                };
                FunctionResponse::failure(id, error)
            }
            Err(err) => FunctionResponse::failure(
                id,
                RemoteErrorBody {
                    message: err.to_string(),
                    code: None,
                },
            ),
        }
    }
}

#[async_trait]
impl Connector for SseConnector {
    #[instrument(skip_all)]
    async fn connect(&self, events: EventHub) -> Result<(), ClientError> {
        if self.active.lock().is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let url = self.rpc_url("subscribe")?;
        debug!(%url, "opening push channel");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| ClientError::handshake(format!("subscribe request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::handshake(format!("subscribe returned {status}")));
        }

        self.router.bind(events);

        let router = Arc::clone(&self.router);
        let mut stream = response.bytes_stream().eventsource();
        let reader = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) => {
                        if let Some(event) = decode_push_line(&event.data) {
                            router.route(Inbound::Event(event));
                        }
                    }
                    // Stream-level errors never tear down the session.
                    Err(err) => error!(error = %err, "push channel error"),
                }
            }
            debug!("push channel closed");
        });

        *self.active.lock() = Some(Active { reader });
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
        if self.active.lock().is_none() {
            return Err(ClientError::NotConnected);
        }

        let collector = self.router.register(&request.id);
        debug!(id = %request.id, function = %request.function, "sending invoke request");

        // The HTTP response re-enters through the router so that
        // correlation is exercised identically to the channel transport.
        let response = self.perform_invoke(&request).await;
        self.router.route(Inbound::Response(response));

        Ok(await_response(collector).await)
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.config.user_url.as_deref().unwrap_or(DEFAULT_USER_URL);
        Ok(Url::parse(base)?.join(path)?)
    }
}
