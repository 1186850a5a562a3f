//! Wire protocol for Handoff.
//!
//! Defines the framing, message types, and serialization format used between
//! game servers and the key-value backend, and for the control-plane notice a
//! source server sends a destination during an entity handoff. Live game
//! traffic does not go through this protocol.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{FrameHeader, WireCodec, FRAME_HEADER_LEN};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    error_codes, WireEntry, WireMessage, WirePutOutcome, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
