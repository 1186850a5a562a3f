use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{WireMessage, MAX_MESSAGE_SIZE};

/// Bytes of frame header preceding the payload: 4-byte big-endian length
/// (counting the tag byte plus payload) followed by a 1-byte type tag.
pub const FRAME_HEADER_LEN: usize = 5;

/// Parsed frame header, used by streaming readers to size the read for the
/// remainder of the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: u8,
    /// Payload bytes still to read after the header.
    pub payload_len: usize,
}

/// Codec for Handoff wire messages: `[4 bytes len][1 byte tag][bincode payload]`.
pub struct WireCodec;

impl WireCodec {
    /// Encode a message into a complete frame.
    pub fn encode(msg: &WireMessage) -> ProtocolResult<Vec<u8>> {
        let payload = bincode::serialize(msg)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Parse and validate the 5-byte frame header.
    pub fn decode_header(header: &[u8; FRAME_HEADER_LEN]) -> ProtocolResult<FrameHeader> {
        let len = u32::from_be_bytes(header[0..4].try_into().expect("4-byte slice")) as usize;
        if len < 1 {
            return Err(ProtocolError::Framing("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge { size: len - 1, max: MAX_MESSAGE_SIZE });
        }
        Ok(FrameHeader { tag: header[4], payload_len: len - 1 })
    }

    /// Decode the payload that followed a validated header. The declared tag
    /// must match the decoded variant, otherwise the peer is confused and
    /// the connection cannot be trusted.
    pub fn decode_payload(header: FrameHeader, payload: &[u8]) -> ProtocolResult<WireMessage> {
        if payload.len() != header.payload_len {
            return Err(ProtocolError::Framing(format!(
                "payload length {} does not match header {}",
                payload.len(),
                header.payload_len
            )));
        }
        let msg: WireMessage = bincode::deserialize(payload)
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        if msg.type_tag() != header.tag {
            return Err(ProtocolError::Framing(format!(
                "tag mismatch: header {} but payload decodes as {}",
                header.tag,
                msg.type_name()
            )));
        }
        Ok(msg)
    }

    /// Decode a complete frame from a buffer. Returns the message and the
    /// number of bytes consumed.
    pub fn decode(data: &[u8]) -> ProtocolResult<(WireMessage, usize)> {
        if data.len() < FRAME_HEADER_LEN {
            return Err(ProtocolError::Framing("frame too short".into()));
        }
        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        header_bytes.copy_from_slice(&data[..FRAME_HEADER_LEN]);
        let header = Self::decode_header(&header_bytes)?;
        let total = FRAME_HEADER_LEN + header.payload_len;
        if data.len() < total {
            return Err(ProtocolError::Framing(format!(
                "incomplete frame: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_payload(header, &data[FRAME_HEADER_LEN..total])?;
        Ok((msg, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{WirePutOutcome, PROTOCOL_VERSION};

    #[test]
    fn put_request_roundtrip() {
        let msg = WireMessage::PutRequest {
            key: "state/player.e1".into(),
            version: 4,
            bytes: vec![1, 2, 3],
        };
        let frame = WireCodec::encode(&msg).unwrap();
        let (decoded, consumed) = WireCodec::decode(&frame).unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn conflict_response_roundtrip() {
        let msg = WireMessage::PutResponse {
            outcome: WirePutOutcome::VersionConflict { stored: 9 },
        };
        let frame = WireCodec::encode(&msg).unwrap();
        let (decoded, _) = WireCodec::decode(&frame).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn header_roundtrip_for_streaming_reads() {
        let msg = WireMessage::Hello { version: PROTOCOL_VERSION };
        let frame = WireCodec::encode(&msg).unwrap();

        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        header_bytes.copy_from_slice(&frame[..FRAME_HEADER_LEN]);
        let header = WireCodec::decode_header(&header_bytes).unwrap();
        assert_eq!(header.tag, msg.type_tag());

        let decoded = WireCodec::decode_payload(header, &frame[FRAME_HEADER_LEN..]).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        let err = WireCodec::decode(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::Framing(_)));
    }

    #[test]
    fn decode_rejects_zero_length() {
        let err = WireCodec::decode(&[0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::Framing(_)));
    }

    #[test]
    fn decode_rejects_oversized_declared_length() {
        let len = (MAX_MESSAGE_SIZE as u32) + 2;
        let mut frame = len.to_be_bytes().to_vec();
        frame.push(1);
        let err = WireCodec::decode(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }

    #[test]
    fn decode_rejects_tag_mismatch() {
        let msg = WireMessage::Hello { version: 1 };
        let mut frame = WireCodec::encode(&msg).unwrap();
        frame[4] = WireMessage::DeleteRequest { key: String::new() }.type_tag();
        let err = WireCodec::decode(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::Framing(_)));
    }
}
