//! Ownership registry for Handoff.
//!
//! Tracks, for every entity, which server currently holds authority, and
//! mediates transfers through a small per-entity state machine:
//!
//! ```text
//! Unowned → Owned(server) → InTransit(from, to) → Owned(to)
//!                                │
//!                                └──── abort ───→ Owned(from)
//! ```
//!
//! Registry records live in the shared key-value backend under `own/` and
//! are mutated exclusively through conditional puts on the record's write
//! sequence — the registry takes no cross-process locks. Two servers racing
//! the same transition make the same read, and the backend's strictly-greater
//! check lets exactly one write land; the loser observes a definitive
//! conflict error.
//!
//! A transfer stuck `InTransit` past its deadline is resolved by the
//! [`reconciliation sweep`](OwnershipRegistry::reconcile), which forces the
//! abort edge and returns ownership to the source server.

pub mod error;
pub mod liveness;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use liveness::ServerRecord;
pub use registry::{keys, OwnershipRegistry};
