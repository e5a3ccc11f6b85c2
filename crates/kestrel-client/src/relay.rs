//! Single-slot handoff between one producer and one consumer.
//!
//! [`relay`] returns a [`Settler`]/[`Collector`] pair around a one-item
//! slot. The state machine is `Pending → Settled`, terminal, never reused:
//! settling consumes the `Settler` and collecting consumes the `Collector`,
//! so a second settle or a second collect of the same relay does not
//! compile. Dropping the `Settler` unsettled is the terminal rejection
//! path — the collector observes it as `None`.
//!
//! The relay models "connection established" signalling (producer = the
//! handshake completion, consumer = the `connect()` caller) and is the
//! atomic cell inside the broadcast hub and the pending-invocation table.

use tokio::sync::oneshot;

/// Producer half of a relay.
#[derive(Debug)]
pub struct Settler<T>(oneshot::Sender<T>);

/// Consumer half of a relay.
#[derive(Debug)]
pub struct Collector<T>(oneshot::Receiver<T>);

/// Create a connected settler/collector pair.
#[must_use]
pub fn relay<T>() -> (Settler<T>, Collector<T>) {
    let (tx, rx) = oneshot::channel();
    (Settler(tx), Collector(rx))
}

impl<T> Settler<T> {
    /// Deposit the value. If the collector has already gone away the value
    /// is discarded.
    pub fn settle(self, value: T) {
        let _ = self.0.send(value);
    }
}

impl<T> Collector<T> {
    /// Suspend until the relay settles. `None` means the producer went away
    /// without settling.
    pub async fn collect(self) -> Option<T> {
        self.0.await.ok()
    }
}
