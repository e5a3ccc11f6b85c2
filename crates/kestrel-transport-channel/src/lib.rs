//! # kestrel-transport-channel
//!
//! Message-channel transport binding for the Kestrel client.
//!
//! The hosted context hands the client a dedicated bidirectional port after
//! a capability handshake; requests travel as JSON text frames and the same
//! port carries responses and observable events back. The browser-level
//! primitives are abstracted behind [`port::ChannelHost`] and
//! [`port::MessagePort`] so the binding stays platform-independent.

#![deny(unsafe_code)]

pub mod connector;
pub mod port;

pub use connector::{ChannelConnector, ChannelConnectorConfig};
pub use port::{ChannelHost, HostMessage, MessagePort, CONNECT_SENTINEL};
