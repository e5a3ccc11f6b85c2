//! # kestrel-client
//!
//! The client-side RPC engine: response correlation, event fan-out, and the
//! public facade.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `relay` | Single-slot producer/consumer handoff |
//! | `hub` | Broadcast fan-out of named event streams to N subscribers |
//! | `router` | Pending-invocation table, correlation by id, event routing |
//! | `connector` | The transport-facing [`Connector`] trait |
//! | `client` | [`Client`] facade: connect/disconnect/get/invoke/subscribe/url |
//! | `local` | In-process connector for tests and host-less wiring |
//!
//! ## Data Flow
//!
//! `client` → `connector.invoke(request)` → transport send → (async)
//! transport receive → `router` resolves the pending invocation or publishes
//! to `hub` → per-name subscriptions receive data.

#![deny(unsafe_code)]

pub mod client;
pub mod connector;
pub mod hub;
pub mod local;
pub mod relay;
pub mod router;

pub use client::{Client, Endpoint, FunctionHandle, STREAM_MARKER};
pub use connector::Connector;
pub use hub::{EventHub, Subscription};
pub use local::{LocalConnector, LocalInterface};
pub use router::{Router, await_response};
