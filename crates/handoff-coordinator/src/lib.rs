//! Migration coordination for Handoff.
//!
//! [`MigrationCoordinator`] runs the end-to-end handoff saga for one server
//! process: suspend at the source, persist the snapshot, move the registry
//! entry, resume at the destination. Compensation is explicit: any failure
//! before the registry commit aborts the transfer back to the source, and
//! nothing after the commit can roll ownership back.
//!
//! [`EntityProxy`] is the sole engine-facing boundary: the gameplay layer
//! supplies serialized state and rehydrates from it, and knows nothing about
//! versions, registries, or backends.
//!
//! [`Reconciler`] is the background task every server runs: it heartbeats
//! the local server and force-aborts transfers stuck past the deadline.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod proxy;
pub mod reconciler;

pub use config::{ConfigError, HandoffConfig};
pub use coordinator::{MigrationCoordinator, MigrationOutcome};
pub use error::{MigrationError, MigrationResult};
pub use proxy::{EntityProxy, ProxyError, RemoteEntityProxy};
pub use reconciler::{Reconciler, ReconcilerHandle};
