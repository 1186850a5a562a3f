use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{EntityId, ServerId};
use crate::version::Version;

/// Where authoritative control of an entity currently sits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnershipState {
    /// No server holds the entity (pre-claim or post-release).
    Unowned,
    /// Exactly one server holds authority.
    Owned(ServerId),
    /// A transfer is in flight. Strictly transient: a transfer left in this
    /// state past the configured deadline is force-aborted back to `from`.
    InTransit { from: ServerId, to: ServerId },
}

/// Authoritative ownership record for one entity.
///
/// `version` is the entity epoch: bumped on claim, on save, and on a
/// committed transfer — never on an abort. `seq` is the record's write
/// sequence and is the compare-and-swap axis for registry writes, so an
/// abort (which must rewrite the record without touching `version`) still
/// passes the backend's strictly-greater conditional put.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub entity: EntityId,
    pub state: OwnershipState,
    pub version: Version,
    pub seq: u64,
    pub updated_at: DateTime<Utc>,
}

impl OwnershipRecord {
    /// The owning server, if the entity is currently `Owned`.
    pub fn owner(&self) -> Option<&ServerId> {
        match &self.state {
            OwnershipState::Owned(server) => Some(server),
            _ => None,
        }
    }

    pub fn is_in_transit(&self) -> bool {
        matches!(self.state, OwnershipState::InTransit { .. })
    }

    /// How long the record has sat in its current state, as of `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.updated_at
    }
}
