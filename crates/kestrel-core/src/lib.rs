//! # kestrel-core
//!
//! Foundation types for the Kestrel RPC client.
//!
//! This crate provides the shared vocabulary the client engine and both
//! transport bindings depend on:
//!
//! - **Payloads**: [`payload::Payload`] — opaque text/JSON/binary call data
//! - **Wire protocol**: [`protocol::FunctionRequest`],
//!   [`protocol::FunctionResponse`], [`protocol::ObservableEvent`], and the
//!   [`protocol::Inbound`] classification of received messages
//! - **Request ids**: [`ids::RequestId`] correlation tokens
//! - **Errors**: [`errors::ClientError`] taxonomy via `thiserror`
//! - **Logging**: [`logging::init`] opt-in `tracing` bootstrap
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other kestrel crates.

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod payload;
pub mod protocol;

pub use errors::ClientError;
pub use ids::RequestId;
pub use payload::Payload;
pub use protocol::{FunctionRequest, FunctionResponse, Inbound, ObservableEvent, RemoteErrorBody};
