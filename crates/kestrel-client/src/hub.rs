//! Broadcast fan-out of named event streams.
//!
//! One publisher (the connector's receive path) feeds an [`EventHub`]; any
//! number of [`Subscription`]s consume the same named stream at their own
//! pace. Each subscription owns a private relay chain: a publish settles the
//! subscription's current slot, and the subscriber re-arms a fresh relay
//! after every collected value.
//!
//! Delivery policy:
//!
//! - A stream with zero subscribers discards the event (counted, never
//!   buffered for late subscribers).
//! - A subscriber whose slot is still occupied has that delivery rejected
//!   with a slow-consumer error (counted); other subscribers still receive
//!   the value.
//! - [`EventHub::close`] ends every in-flight `next()` with `None` and turns
//!   later publishes into no-ops.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kestrel_core::{ClientError, Payload, protocol::ObservableEvent};
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::relay::{Collector, Settler, relay};

/// One registered subscriber slot within a stream's fan-out list.
struct Feeder {
    id: u64,
    slot: Option<Settler<Payload>>,
}

#[derive(Default)]
struct Registry {
    streams: HashMap<String, Vec<Feeder>>,
    closed: bool,
}

struct HubInner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

/// Fan-out hub delivering published events to every current subscriber of a
/// named stream.
///
/// Cheap to clone; clones share the same subscriber registry.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a new independent subscription for `observable`.
    ///
    /// Never blocks. Each call yields its own relay chain, even for a name
    /// that already has subscribers. Subscribing to a closed hub yields a
    /// subscription that immediately ends.
    pub fn subscribe(&self, observable: impl Into<String>) -> Subscription {
        let observable = observable.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (settler, collector) = relay();

        let mut registry = self.inner.registry.lock();
        if registry.closed {
            // The settler is dropped here, so the first `next()` sees `None`.
            debug!(observable, "subscribe on closed hub");
        } else {
            registry.streams.entry(observable.clone()).or_default().push(Feeder {
                id,
                slot: Some(settler),
            });
        }
        drop(registry);

        Subscription {
            hub: Arc::clone(&self.inner),
            observable,
            id,
            collector: Some(collector),
        }
    }

    /// Deliver an event to every current subscriber of its stream.
    ///
    /// Entered only from the connector's receive path — the hub does not
    /// support concurrent publishers.
    pub fn publish(&self, event: &ObservableEvent) {
        let mut registry = self.inner.registry.lock();
        if registry.closed {
            debug!(observable = %event.observable, "publish on closed hub ignored");
            return;
        }

        let Some(feeders) = registry.streams.get_mut(&event.observable) else {
            counter!("kestrel_events_discarded_total").increment(1);
            debug!(observable = %event.observable, "no subscribers, event discarded");
            return;
        };

        let mut delivered = 0u32;
        for feeder in feeders.iter_mut() {
            match feeder.slot.take() {
                Some(settler) => {
                    settler.settle(event.data.clone());
                    delivered += 1;
                }
                None => {
                    let err = ClientError::SlowConsumer {
                        observable: event.observable.clone(),
                    };
                    counter!("kestrel_slow_consumers_total").increment(1);
                    warn!(subscriber = feeder.id, error = %err, "delivery rejected");
                }
            }
        }
        debug!(observable = %event.observable, delivered, "event published");
    }

    /// Terminate the hub.
    ///
    /// Every in-flight consumption completes gracefully and all further
    /// publishes are ignored.
    pub fn close(&self) {
        let mut registry = self.inner.registry.lock();
        registry.closed = true;
        // Dropping the armed settlers ends each subscriber's pending collect.
        registry.streams.clear();
    }

    /// Number of live subscriptions for `observable`.
    #[must_use]
    pub fn subscriber_count(&self, observable: &str) -> usize {
        self.inner
            .registry
            .lock()
            .streams
            .get(observable)
            .map_or(0, Vec::len)
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl HubInner {
    /// Put a fresh settler back into the subscriber's slot.
    ///
    /// Returns false when the hub closed or the subscription was removed in
    /// the meantime, in which case the chain must not continue.
    fn rearm(&self, observable: &str, id: u64, settler: Settler<Payload>) -> bool {
        let mut registry = self.registry.lock();
        if registry.closed {
            return false;
        }
        let Some(feeders) = registry.streams.get_mut(observable) else {
            return false;
        };
        match feeders.iter_mut().find(|f| f.id == id) {
            Some(feeder) => {
                feeder.slot = Some(settler);
                true
            }
            None => false,
        }
    }

    fn unsubscribe(&self, observable: &str, id: u64) {
        let mut registry = self.registry.lock();
        if let Some(feeders) = registry.streams.get_mut(observable) {
            feeders.retain(|f| f.id != id);
            if feeders.is_empty() {
                let _ = registry.streams.remove(observable);
            }
        }
    }
}

/// One independently-paced consumer of a named stream.
///
/// `next` takes `&mut self`, so a single handle supports exactly one active
/// consumption loop at a time; a second concurrent loop over the same handle
/// does not compile. Dropping the subscription unregisters it.
pub struct Subscription {
    hub: Arc<HubInner>,
    observable: String,
    id: u64,
    collector: Option<Collector<Payload>>,
}

impl Subscription {
    /// The stream this subscription consumes.
    #[must_use]
    pub fn observable(&self) -> &str {
        &self.observable
    }

    /// Wait for the next published value.
    ///
    /// Returns `None` once the hub closes or the subscription ends; the
    /// sequence is otherwise unbounded, each element produced lazily as the
    /// subscriber asks for it.
    pub async fn next(&mut self) -> Option<Payload> {
        let collector = self.collector.take()?;
        let value = collector.collect().await?;

        // Re-arm for the next value. When the hub has closed underneath us
        // the chain stops and later calls return `None`.
        let (settler, next_collector) = relay();
        if self.hub.rearm(&self.observable, self.id, settler) {
            self.collector = Some(next_collector);
        }
        Some(value)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.observable, self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("observable", &self.observable)
            .field("id", &self.id)
            .field("live", &self.collector.is_some())
            .finish()
    }
}
