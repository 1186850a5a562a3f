use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic per-entity version counter.
///
/// Strictly increases across committed snapshots and ownership commits for a
/// given entity. The backend's conditional put accepts a write only when the
/// supplied version is strictly greater than the stored one, so a stale
/// owner can never overwrite newer state.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Version(u64);

impl Version {
    /// First version assigned when an entity is claimed.
    pub const fn initial() -> Self {
        Self(1)
    }

    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    /// The next version along the axis.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<Version> for u64 {
    fn from(v: Version) -> Self {
        v.0
    }
}
