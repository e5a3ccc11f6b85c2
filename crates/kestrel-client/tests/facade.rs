//! End-to-end facade tests over the in-process connector.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use kestrel_client::{Client, Endpoint, LocalConnector, LocalInterface};
use kestrel_core::protocol::RemoteErrorBody;
use kestrel_core::{ClientError, Payload};
use serde_json::json;
use tokio::time::timeout;

fn echo_interface() -> LocalInterface {
    LocalInterface::new()
        .function("fn1", |_| async { Ok(Payload::null()) })
        .function("fn2", |data| async { Ok(data) })
        .function("nested.fn", |data| async { Ok(data) })
        .function("denied", |_| async {
            Err(RemoteErrorBody {
                message: "permission denied".into(),
                code: Some("PERMISSION_DENIED".into()),
            })
        })
}

fn wired_client() -> (Client, Arc<LocalConnector>) {
    let connector = Arc::new(LocalConnector::new(echo_interface()));
    (Client::new(connector.clone()), connector)
}

#[tokio::test]
async fn round_trip_echo() {
    let (client, _connector) = wired_client();
    client.connect().await.unwrap();
    let result = client.invoke("fn2", "ping").await.unwrap();
    assert_eq!(result.as_str(), Some("ping"));
}

#[tokio::test]
async fn dotted_names_are_plain_strings() {
    let (client, _connector) = wired_client();
    client.connect().await.unwrap();
    let result = client.invoke("nested.fn", json!({"n": 1})).await.unwrap();
    assert_eq!(result.as_json().unwrap()["n"], 1);
}

#[tokio::test]
async fn remote_failure_surfaces_as_typed_error() {
    let (client, _connector) = wired_client();
    client.connect().await.unwrap();
    let err = client.invoke("denied", Payload::null()).await.unwrap_err();
    assert_matches!(err, ClientError::Remote { message, code } => {
        assert_eq!(message, "permission denied");
        assert_eq!(code.as_deref(), Some("PERMISSION_DENIED"));
    });
}

#[tokio::test]
async fn unknown_function_is_a_bad_invocation() {
    let (client, _connector) = wired_client();
    client.connect().await.unwrap();
    assert_matches!(
        client.invoke("ghost", Payload::null()).await,
        Err(ClientError::BadInvocation { .. })
    );
}

#[tokio::test]
async fn events_fan_out_to_every_subscription() {
    let (client, connector) = wired_client();
    client.connect().await.unwrap();

    let mut subs = Vec::new();
    for _ in 0..3 {
        subs.push(client.subscribe("ticks$").unwrap());
    }
    connector.emit("ticks$", Payload::from(json!(7))).unwrap();

    for sub in &mut subs {
        assert_eq!(sub.next().await, Some(Payload::Json(json!(7))));
    }
}

#[tokio::test]
async fn events_without_subscribers_are_discarded() {
    let (client, connector) = wired_client();
    client.connect().await.unwrap();
    connector.emit("ticks$", Payload::from(json!(1))).unwrap();

    // A later subscription starts from the next publish, not the past one.
    let mut sub = client.subscribe("ticks$").unwrap();
    connector.emit("ticks$", Payload::from(json!(2))).unwrap();
    assert_eq!(sub.next().await, Some(Payload::Json(json!(2))));
}

#[tokio::test]
async fn sequencing_is_preserved_per_subscriber() {
    let (client, connector) = wired_client();
    client.connect().await.unwrap();
    let mut sub = client.subscribe("seq$").unwrap();

    for n in 1..=3 {
        connector.emit("seq$", Payload::from(json!(n))).unwrap();
        assert_eq!(sub.next().await, Some(Payload::Json(json!(n))));
    }
}

#[tokio::test]
async fn get_caches_functions_but_not_streams() {
    let (client, _connector) = wired_client();
    client.connect().await.unwrap();

    let Endpoint::Function(first) = client.get("fn1") else {
        panic!("expected function");
    };
    let Endpoint::Function(second) = client.get("fn1") else {
        panic!("expected function");
    };
    assert_eq!(first.name(), second.name());

    let Endpoint::Stream(a) = client.get("evt$") else {
        panic!("expected stream");
    };
    let Endpoint::Stream(b) = client.get("evt$") else {
        panic!("expected stream");
    };
    assert_eq!(a.observable(), "evt$");
    assert_eq!(b.observable(), "evt$");
}

#[tokio::test]
async fn subscriptions_resume_after_reconnect() {
    let (client, connector) = wired_client();
    client.connect().await.unwrap();
    let mut sub = client.subscribe("evt$").unwrap();

    client.disconnect().await.unwrap();
    // Emitting while disconnected is rejected on the host side.
    assert_matches!(
        connector.emit("evt$", Payload::null()),
        Err(ClientError::NotConnected)
    );

    client.connect().await.unwrap();
    connector.emit("evt$", Payload::from(json!("back"))).unwrap();
    assert_eq!(
        timeout(Duration::from_secs(1), sub.next()).await.unwrap(),
        Some(Payload::Json(json!("back")))
    );
}

#[tokio::test]
async fn invoke_while_disconnected_never_reaches_the_connector() {
    let (client, _connector) = wired_client();
    assert_matches!(
        client.invoke("fn2", "ping").await,
        Err(ClientError::NotConnected)
    );
}
