//! Durable state persistence for Handoff.
//!
//! The [`KvBackend`] trait is the storage seam: a versioned key-value space
//! with a strictly-greater conditional put. [`MemoryKv`] implements it
//! in-process (local development and tests); [`RemoteKv`] implements it over
//! the pooled transport against the shared backend service.
//!
//! [`StateStore`] sits on top and speaks in entities and snapshots: it owns
//! key namespacing, snapshot encoding, and the bounded exponential-backoff
//! retry policy for transient backend failures.

pub mod backend;
pub mod error;
pub mod memory;
pub mod remote;
pub mod retry;
pub mod store;

pub use backend::{keys, KvBackend, PutOutcome, Versioned};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryKv;
pub use remote::RemoteKv;
pub use retry::RetryPolicy;
pub use store::StateStore;
