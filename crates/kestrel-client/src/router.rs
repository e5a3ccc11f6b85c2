//! Correlation of inbound messages to pending invocations and streams.
//!
//! Both transport bindings share this logic unchanged: register a pending
//! entry per outgoing request, then [`Router::route`] every received
//! message — responses settle the entry matching their id, observable
//! events go to the bound [`EventHub`].

use std::collections::HashMap;

use kestrel_core::protocol::{FunctionResponse, Inbound};
use kestrel_core::RequestId;
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::hub::EventHub;
use crate::relay::{Collector, Settler, relay};

/// Pending-invocation table plus event routing, shared by every transport.
pub struct Router {
    pending: Mutex<HashMap<String, Settler<FunctionResponse>>>,
    events: Mutex<Option<EventHub>>,
}

impl Router {
    /// Create an empty router with no bound hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            events: Mutex::new(None),
        }
    }

    /// Attach the facade-owned hub for the lifetime of a connection.
    pub fn bind(&self, events: EventHub) {
        *self.events.lock() = Some(events);
    }

    /// Detach the hub on disconnect.
    pub fn unbind(&self) {
        *self.events.lock() = None;
    }

    /// Register a pending invocation and hand back its response collector.
    ///
    /// The entry settles exactly once, when the matching response is routed;
    /// it disappears without settling when the table is abandoned.
    pub fn register(&self, id: &RequestId) -> Collector<FunctionResponse> {
        let (settler, collector) = relay();
        let _ = self.pending.lock().insert(id.as_str().to_owned(), settler);
        collector
    }

    /// Route one received message.
    pub fn route(&self, inbound: Inbound) {
        match inbound {
            Inbound::Response(response) => self.settle(response),
            Inbound::Event(event) => {
                let events = self.events.lock();
                match events.as_ref() {
                    Some(hub) => {
                        debug!(observable = %event.observable, "event received");
                        hub.publish(&event);
                    }
                    None => warn!(observable = %event.observable, "event received while unbound"),
                }
            }
        }
    }

    /// Resolve the pending invocation matching a response's id.
    ///
    /// A response with no matching entry is a protocol anomaly: counted and
    /// logged, never fatal, and never affects other pending invocations.
    fn settle(&self, response: FunctionResponse) {
        let entry = self.pending.lock().remove(response.id());
        match entry {
            Some(settler) => {
                debug!(
                    id = response.id(),
                    failed = matches!(response, FunctionResponse::Failure { .. }),
                    "response routed"
                );
                settler.settle(response);
            }
            None => {
                counter!("kestrel_protocol_anomalies_total").increment(1);
                warn!(id = response.id(), "response without pending invocation");
            }
        }
    }

    /// Remove a single pending entry without settling it.
    ///
    /// Used when a send fails after registration, so the entry does not
    /// outlive a request that never reached the wire.
    pub fn forget(&self, id: &RequestId) {
        let _ = self.pending.lock().remove(id.as_str());
    }

    /// Clear the pending table wholesale.
    ///
    /// Called on disconnect. The abandoned entries are never resolved nor
    /// rejected — each awaiting caller observes indefinite non-completion.
    pub fn abandon_all(&self) -> usize {
        let mut pending = self.pending.lock();
        let abandoned = pending.len();
        pending.clear();
        if abandoned > 0 {
            debug!(abandoned, "pending invocations abandoned");
        }
        abandoned
    }

    /// Number of invocations still awaiting their response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Await a registered response.
///
/// An abandoned entry never completes: the relay closes without settling and
/// this future stays pending forever, leaving timeout policy to the caller.
pub async fn await_response(collector: Collector<FunctionResponse>) -> FunctionResponse {
    match collector.collect().await {
        Some(response) => response,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::protocol::{ObservableEvent, RemoteErrorBody};
    use kestrel_core::Payload;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    fn success(id: &str, data: serde_json::Value) -> Inbound {
        Inbound::Response(FunctionResponse::success(id, Payload::Json(data)))
    }

    #[tokio::test]
    async fn response_settles_matching_invocation() {
        let router = Router::new();
        let id = RequestId::from("req_a");
        let collector = router.register(&id);
        router.route(success("req_a", json!("pong")));
        let response = collector.collect().await.unwrap();
        assert_eq!(response.id(), "req_a");
    }

    #[tokio::test]
    async fn correlation_is_by_id_not_send_order() {
        let router = Router::new();
        let first = router.register(&RequestId::from("req_a"));
        let second = router.register(&RequestId::from("req_b"));

        // Responses arrive in reverse order.
        router.route(success("req_b", json!("b")));
        router.route(success("req_a", json!("a")));

        let a = first.collect().await.unwrap();
        let b = second.collect().await.unwrap();
        assert_eq!(a.id(), "req_a");
        assert_eq!(b.id(), "req_b");
    }

    #[tokio::test(start_paused = true)]
    async fn response_for_a_settles_only_a() {
        let router = Router::new();
        let a = router.register(&RequestId::from("req_a"));
        let b = router.register(&RequestId::from("req_b"));

        router.route(success("req_a", json!(1)));
        assert!(a.collect().await.is_some());

        // `b` is still pending.
        assert_eq!(router.pending_count(), 1);
        let waited = timeout(Duration::from_millis(50), await_response(b)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn unknown_id_is_ignored() {
        let router = Router::new();
        let pending = router.register(&RequestId::from("req_known"));

        // Must not panic, must not settle the unrelated invocation.
        router.route(success("req_ghost", json!(1)));
        assert_eq!(router.pending_count(), 1);

        router.route(success("req_known", json!(2)));
        assert!(pending.collect().await.is_some());
    }

    #[tokio::test]
    async fn failure_responses_are_routed_too() {
        let router = Router::new();
        let collector = router.register(&RequestId::from("req_a"));
        router.route(Inbound::Response(FunctionResponse::failure(
            "req_a",
            RemoteErrorBody {
                message: "nope".into(),
                code: Some("NOPE".into()),
            },
        )));
        let response = collector.collect().await.unwrap();
        assert!(matches!(response, FunctionResponse::Failure { .. }));
    }

    #[tokio::test]
    async fn events_reach_the_bound_hub() {
        let router = Router::new();
        let hub = EventHub::new();
        router.bind(hub.clone());
        let mut sub = hub.subscribe("ticks$");

        router.route(Inbound::Event(ObservableEvent {
            observable: "ticks$".into(),
            data: Payload::Json(json!(1)),
        }));
        assert_eq!(sub.next().await, Some(Payload::Json(json!(1))));
    }

    #[tokio::test]
    async fn events_while_unbound_are_dropped() {
        let router = Router::new();
        router.route(Inbound::Event(ObservableEvent {
            observable: "ticks$".into(),
            data: Payload::null(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_all_clears_without_settling() {
        let router = Router::new();
        let collector = router.register(&RequestId::from("req_a"));
        let _ = router.register(&RequestId::from("req_b"));

        assert_eq!(router.abandon_all(), 2);
        assert_eq!(router.pending_count(), 0);

        // The abandoned future neither resolves nor rejects.
        let waited = timeout(Duration::from_millis(50), await_response(collector)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn late_response_after_abandon_is_an_anomaly() {
        let router = Router::new();
        let _collector = router.register(&RequestId::from("req_a"));
        let _ = router.abandon_all();
        // No pending entry left; routed response is counted and dropped.
        router.route(success("req_a", json!(1)));
        assert_eq!(router.pending_count(), 0);
    }
}
