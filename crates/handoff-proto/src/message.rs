use serde::{Deserialize, Serialize};

/// Version of the wire protocol. Exchanged in the `Hello`/`HelloAck`
/// handshake; a mismatch is fatal for the connection.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on a single message payload. Entity snapshots ride inside
/// messages, so this caps the largest persistable entity.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Error codes carried by [`WireMessage::Error`].
pub mod error_codes {
    /// The peer does not handle this message type.
    pub const UNSUPPORTED: u32 = 1;
    /// The request was understood but malformed (bad key, bad id).
    pub const MALFORMED: u32 = 2;
    /// The peer failed internally.
    pub const INTERNAL: u32 = 3;
}

/// A stored value paired with its version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEntry {
    pub version: u64,
    pub bytes: Vec<u8>,
}

/// Result of a conditional put at the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WirePutOutcome {
    Stored,
    /// Rejected: the supplied version did not strictly exceed `stored`.
    VersionConflict { stored: u64 },
}

/// All messages exchanged over a Handoff connection.
///
/// `Get`/`Put`/`Delete`/`List` form the storage protocol against the
/// key-value backend. `HandoffNotice`/`HandoffAck` form the control-plane
/// exchange between peer servers when an entity arrives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    Hello { version: u32 },
    HelloAck { version: u32 },

    GetRequest { key: String },
    GetResponse { entry: Option<WireEntry> },

    /// Conditional put: stored only if `version` strictly exceeds the
    /// currently stored version (or the key is absent).
    PutRequest { key: String, version: u64, bytes: Vec<u8> },
    PutResponse { outcome: WirePutOutcome },

    DeleteRequest { key: String },
    DeleteResponse { existed: bool },

    ListRequest { prefix: String },
    ListResponse { entries: Vec<(String, u64)> },

    /// Source server telling a destination that an entity is now theirs.
    /// `payload` carries the state inline when available; otherwise the
    /// destination fetches the stored snapshot.
    HandoffNotice { entity: String, payload: Option<Vec<u8>> },
    HandoffAck { entity: String, accepted: bool },

    Error { code: u32, message: String },
}

impl WireMessage {
    /// One-byte tag written into the frame header ahead of the payload.
    pub fn type_tag(&self) -> u8 {
        match self {
            WireMessage::Hello { .. } => 1,
            WireMessage::HelloAck { .. } => 2,
            WireMessage::GetRequest { .. } => 3,
            WireMessage::GetResponse { .. } => 4,
            WireMessage::PutRequest { .. } => 5,
            WireMessage::PutResponse { .. } => 6,
            WireMessage::DeleteRequest { .. } => 7,
            WireMessage::DeleteResponse { .. } => 8,
            WireMessage::ListRequest { .. } => 9,
            WireMessage::ListResponse { .. } => 10,
            WireMessage::HandoffNotice { .. } => 11,
            WireMessage::HandoffAck { .. } => 12,
            WireMessage::Error { .. } => 13,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            WireMessage::Hello { .. } => "Hello",
            WireMessage::HelloAck { .. } => "HelloAck",
            WireMessage::GetRequest { .. } => "GetRequest",
            WireMessage::GetResponse { .. } => "GetResponse",
            WireMessage::PutRequest { .. } => "PutRequest",
            WireMessage::PutResponse { .. } => "PutResponse",
            WireMessage::DeleteRequest { .. } => "DeleteRequest",
            WireMessage::DeleteResponse { .. } => "DeleteResponse",
            WireMessage::ListRequest { .. } => "ListRequest",
            WireMessage::ListResponse { .. } => "ListResponse",
            WireMessage::HandoffNotice { .. } => "HandoffNotice",
            WireMessage::HandoffAck { .. } => "HandoffAck",
            WireMessage::Error { .. } => "Error",
        }
    }

    /// True when the peer reported a failure instead of a response.
    pub fn is_error(&self) -> bool {
        matches!(self, WireMessage::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_unique() {
        let msgs: Vec<WireMessage> = vec![
            WireMessage::Hello { version: 1 },
            WireMessage::HelloAck { version: 1 },
            WireMessage::GetRequest { key: String::new() },
            WireMessage::GetResponse { entry: None },
            WireMessage::PutRequest { key: String::new(), version: 0, bytes: vec![] },
            WireMessage::PutResponse { outcome: WirePutOutcome::Stored },
            WireMessage::DeleteRequest { key: String::new() },
            WireMessage::DeleteResponse { existed: false },
            WireMessage::ListRequest { prefix: String::new() },
            WireMessage::ListResponse { entries: vec![] },
            WireMessage::HandoffNotice { entity: String::new(), payload: None },
            WireMessage::HandoffAck { entity: String::new(), accepted: false },
            WireMessage::Error { code: 0, message: String::new() },
        ];
        let mut tags: Vec<u8> = msgs.iter().map(|m| m.type_tag()).collect();
        let len = tags.len();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), len, "type tags should be unique");
    }

    #[test]
    fn type_names_match_variants() {
        let msg = WireMessage::PutRequest { key: "k".into(), version: 1, bytes: vec![] };
        assert_eq!(msg.type_name(), "PutRequest");
        let msg = WireMessage::Error { code: 0, message: String::new() };
        assert!(msg.is_error());
    }
}
