//! Low-level request/response transport for Handoff.
//!
//! [`TransportClient`] maintains a bounded pool of connections to one
//! endpoint (the key-value backend or a peer server) and exchanges framed
//! [`handoff_proto::WireMessage`]s with a per-call timeout. It performs no
//! business-level validation: callers interpret responses.
//!
//! Connections are checked out of the pool for the duration of one call, so
//! a connection is never shared across concurrent requests. Transport-level
//! failures are retried on a fresh connection up to a configured cap;
//! protocol errors are fatal for the connection and surfaced to the caller.

pub mod client;
pub mod config;
pub mod conn;
pub mod error;
#[cfg(feature = "tls")]
pub mod tls;

pub use client::TransportClient;
pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
