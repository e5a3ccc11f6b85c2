//! Abstract message-channel capabilities.
//!
//! The platform primitives this binding rides on (a global message context,
//! transferable ports) are external collaborators. This module keeps the
//! transport honest about what it actually needs: a way to ask the host to
//! start the handshake, a stream of tagged context messages on which the
//! dedicated port eventually arrives, and a bidirectional text-frame port
//! once it has.

use async_trait::async_trait;
use kestrel_core::ClientError;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Tag on the context message that carries the dedicated port.
pub const CONNECT_SENTINEL: &str = "kestrel:connect";

/// One half of a bidirectional text-frame channel.
pub struct MessagePort {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl MessagePort {
    /// Build a connected pair of ports, one per side of the channel.
    #[must_use]
    pub fn pair() -> (MessagePort, MessagePort) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            MessagePort {
                tx: a_tx,
                rx: Mutex::new(Some(a_rx)),
            },
            MessagePort {
                tx: b_tx,
                rx: Mutex::new(Some(b_rx)),
            },
        )
    }

    /// Post a text frame to the peer.
    ///
    /// Fails with [`ClientError::NotConnected`] once the peer half is gone.
    pub fn send(&self, frame: String) -> Result<(), ClientError> {
        self.tx.send(frame).map_err(|_| ClientError::NotConnected)
    }

    /// Take the inbound frame receiver.
    ///
    /// Exactly one reader may consume a port; later calls return `None`.
    #[must_use]
    pub fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.rx.lock().take()
    }
}

impl std::fmt::Debug for MessagePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePort")
            .field("reader_taken", &self.rx.lock().is_none())
            .finish()
    }
}

/// A tagged message delivered on the host context during the handshake.
#[derive(Debug)]
pub struct HostMessage {
    /// Message tag; the port transfer carries [`CONNECT_SENTINEL`].
    pub tag: String,
    /// The dedicated port, present on the transfer message only.
    pub port: Option<MessagePort>,
}

/// Capability handle onto the hosting context.
#[async_trait]
pub trait ChannelHost: Send + Sync {
    /// Ask the host to begin the capability handshake.
    ///
    /// Returns the stream of context messages on which the host will
    /// asynchronously deliver the [`CONNECT_SENTINEL`] port transfer.
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<HostMessage>, ClientError>;
}
