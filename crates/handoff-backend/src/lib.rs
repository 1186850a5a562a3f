//! Reference storage backend for Handoff.
//!
//! Serves the framed wire protocol over TCP, backed by the in-memory
//! versioned store. Deployments wanting durability put a disk-backed
//! [`handoff_store::KvBackend`] behind [`Backend::bind_with`]; the protocol
//! surface stays the same.

pub mod config;
pub mod error;
pub mod server;

pub use config::BackendConfig;
pub use error::{BackendError, BackendResult};
pub use server::Backend;
