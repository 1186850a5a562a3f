//! Foundation types for Handoff.
//!
//! This crate provides the identifiers, version counters, and record types
//! used throughout the Handoff migration and persistence system. Every other
//! Handoff crate depends on `handoff-types`.
//!
//! # Key Types
//!
//! - [`EntityId`] — Stable identifier for a migratable game-world object
//! - [`ServerId`] — Identifier for a participating server process
//! - [`Version`] — Monotonic per-entity version counter
//! - [`OwnershipRecord`] — Which server owns an entity, and in what state
//! - [`PersistedSnapshot`] — A durably stored, versioned state payload

pub mod error;
pub mod id;
pub mod ownership;
pub mod snapshot;
pub mod version;

pub use error::TypeError;
pub use id::{EntityId, ServerId};
pub use ownership::{OwnershipRecord, OwnershipState};
pub use snapshot::PersistedSnapshot;
pub use version::Version;
