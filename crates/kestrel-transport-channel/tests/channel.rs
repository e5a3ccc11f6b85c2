//! End-to-end tests driving the channel connector against a scripted host.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use bytes::Bytes;
use kestrel_client::Client;
use kestrel_core::{ClientError, Payload};
use kestrel_transport_channel::{
    ChannelConnector, ChannelConnectorConfig, ChannelHost, HostMessage, MessagePort,
    CONNECT_SENTINEL,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

/// Host double: performs the port-transfer handshake, echoes `fn2`, fails
/// `fail`, never answers `never`, and garbles the wire before answering
/// `garble`.
#[derive(Default)]
struct ScriptedHost {
    port: Mutex<Option<Arc<MessagePort>>>,
}

impl ScriptedHost {
    fn emit(&self, observable: &str, data: Value) {
        let frame = json!({"observable": observable, "data": data}).to_string();
        self.port
            .lock()
            .as_ref()
            .expect("host not connected")
            .send(frame)
            .expect("client port gone");
    }

    fn respond(port: &MessagePort, request: &Value) {
        let id = request["id"].as_str().unwrap_or_default();
        let function = request["function"].as_str().unwrap_or_default();
        let reply = match function {
            "fn2" => json!({"id": id, "status": "success", "data": request["data"]}),
            "never" => return,
            "garble" => {
                let _ = port.send("{not json".into());
                json!({"id": id, "status": "success", "data": "ok"})
            }
            _ => json!({
                "id": id,
                "status": "error",
                "error": {"message": "told you", "code": "FAIL"},
            }),
        };
        let _ = port.send(reply.to_string());
    }
}

#[async_trait]
impl ChannelHost for ScriptedHost {
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<HostMessage>, ClientError> {
        let (context_tx, context_rx) = mpsc::unbounded_channel();
        let (client_port, host_port) = MessagePort::pair();
        let host_port = Arc::new(host_port);
        let mut requests = host_port.take_receiver().expect("fresh port");
        *self.port.lock() = Some(Arc::clone(&host_port));

        // Noise before the transfer; the client must ignore it.
        let _ = context_tx.send(HostMessage {
            tag: "kestrel:ready".into(),
            port: None,
        });
        let _ = context_tx.send(HostMessage {
            tag: CONNECT_SENTINEL.into(),
            port: Some(client_port),
        });

        let _ = tokio::spawn(async move {
            while let Some(frame) = requests.recv().await {
                if let Ok(request) = serde_json::from_str::<Value>(&frame) {
                    Self::respond(&host_port, &request);
                }
            }
        });
        Ok(context_rx)
    }
}

/// Host whose context stream ends without ever transferring a port.
struct SilentHost;

#[async_trait]
impl ChannelHost for SilentHost {
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<HostMessage>, ClientError> {
        let (context_tx, context_rx) = mpsc::unbounded_channel();
        let _ = context_tx.send(HostMessage {
            tag: "kestrel:ready".into(),
            port: None,
        });
        drop(context_tx);
        Ok(context_rx)
    }
}

fn wired_client() -> (Client, Arc<ScriptedHost>) {
    let host = Arc::new(ScriptedHost::default());
    let connector = Arc::new(ChannelConnector::new(
        ChannelConnectorConfig::default(),
        host.clone(),
    ));
    (Client::new(connector), host)
}

#[tokio::test]
async fn round_trip_echo() {
    let (client, _host) = wired_client();
    client.connect().await.unwrap();
    let result = client.invoke("fn2", "ping").await.unwrap();
    assert_eq!(result.as_str(), Some("ping"));
}

#[tokio::test]
async fn concurrent_invocations_correlate_by_id() {
    let (client, _host) = wired_client();
    client.connect().await.unwrap();
    let client = Arc::new(client);

    let a = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.invoke("fn2", "a").await }
    });
    let b = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.invoke("fn2", "b").await }
    });

    assert_eq!(a.await.unwrap().unwrap().as_str(), Some("a"));
    assert_eq!(b.await.unwrap().unwrap().as_str(), Some("b"));
}

#[tokio::test]
async fn remote_error_surfaces_with_code() {
    let (client, _host) = wired_client();
    client.connect().await.unwrap();
    let err = client.invoke("explode", Payload::null()).await.unwrap_err();
    assert_matches!(err, ClientError::Remote { message, code } => {
        assert_eq!(message, "told you");
        assert_eq!(code.as_deref(), Some("FAIL"));
    });
}

#[tokio::test]
async fn events_fan_out_to_subscribers() {
    let (client, host) = wired_client();
    client.connect().await.unwrap();

    let mut a = client.subscribe("ticks$").unwrap();
    let mut b = client.subscribe("ticks$").unwrap();
    host.emit("ticks$", json!({"n": 1}));

    let got_a = timeout(Duration::from_secs(1), a.next()).await.unwrap();
    let got_b = timeout(Duration::from_secs(1), b.next()).await.unwrap();
    assert_eq!(got_a.unwrap().as_json().unwrap()["n"], 1);
    assert_eq!(got_b.unwrap().as_json().unwrap()["n"], 1);
}

#[tokio::test]
async fn binary_payload_is_rejected_before_send() {
    let (client, _host) = wired_client();
    client.connect().await.unwrap();

    let err = client
        .invoke("fn2", Payload::Binary(Bytes::from_static(b"\x00\x01")))
        .await
        .unwrap_err();
    assert_matches!(err, ClientError::UnsupportedPayload { message } => {
        assert!(message.contains("message-channel"));
    });

    // The connection is still healthy.
    let result = client.invoke("fn2", "still alive").await.unwrap();
    assert_eq!(result.as_str(), Some("still alive"));
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let (client, _host) = wired_client();
    client.connect().await.unwrap();
    // `garble` sends a broken frame before the real response.
    let result = client.invoke("garble", Payload::null()).await.unwrap();
    assert_eq!(result.as_str(), Some("ok"));
}

#[tokio::test]
async fn disconnect_abandons_pending_invocations() {
    let (client, _host) = wired_client();
    client.connect().await.unwrap();
    let client = Arc::new(client);

    let pending = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.invoke("never", Payload::null()).await }
    });
    sleep(Duration::from_millis(50)).await;

    client.disconnect().await.unwrap();

    // Abandoned: neither resolved nor rejected within the wait window.
    let waited = timeout(Duration::from_millis(200), pending).await;
    assert!(waited.is_err());
}

#[tokio::test]
async fn handshake_fails_when_context_stream_ends() {
    let connector = Arc::new(ChannelConnector::new(
        ChannelConnectorConfig::default(),
        Arc::new(SilentHost),
    ));
    let client = Client::new(connector);
    assert_matches!(client.connect().await, Err(ClientError::Handshake { .. }));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn invoke_after_disconnect_is_rejected() {
    let (client, _host) = wired_client();
    client.connect().await.unwrap();
    client.disconnect().await.unwrap();
    assert_matches!(
        client.invoke("fn2", "ping").await,
        Err(ClientError::NotConnected)
    );
}
