//! Binary frame envelope: magic, opcode, payload length, JSON payload.
//!
//! Header layout, all integers big-endian as sent by the controller:
//!
//! ```text
//! offset 0   4 bytes   magic "AVON"
//! offset 4   2 bytes   opcode
//! offset 6   4 bytes   payload length
//! offset 10  N bytes   UTF-8 JSON payload
//! ```
//!
//! The payload length field must equal the byte length of the payload
//! exactly; `encode` guarantees this by construction and `decode` refuses
//! anything that declares an implausible length.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// 4-byte ASCII magic opening every frame.
pub const MAGIC: [u8; 4] = *b"AVON";

/// Fixed header size: magic + opcode + payload length.
pub const HEADER_LEN: usize = 10;

/// Ceiling on the declared payload length. Real controller payloads stay
/// well under 64 KiB; a length above this is garbage, not a frame we have
/// yet to finish reading.
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

/// Command opcode carried in the frame header.
///
/// Values pinned from captured controller traffic. Unknown values decode
/// as-is so callers can log what the device actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u16);

impl Opcode {
    pub const LOGIN: Self = Self(0x0001);
    pub const LIST_PROGRAMS: Self = Self(0x0002);
    pub const SWITCH_PROGRAM: Self = Self(0x0003);

    // Response opcodes mirror their request with the high bit set.
    pub const LOGIN_ACK: Self = Self(0x8001);
    pub const PROGRAM_LIST: Self = Self(0x8002);
    pub const SWITCH_ACK: Self = Self(0x8003);
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// One decoded unit of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Opcode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: Opcode, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }

    /// Build a frame whose payload is the JSON encoding of `payload`.
    pub fn json<T: Serialize>(command: Opcode, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            command,
            payload: serde_json::to_vec(payload)?,
        })
    }

    /// Parse the payload as JSON.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Frame decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Not enough bytes buffered yet; read more and try again.
    #[error("incomplete frame: need {needed} more bytes")]
    Incomplete { needed: usize },

    /// The first four bytes are not the protocol magic; the peer is not
    /// speaking this protocol and the connection is unusable.
    #[error("bad magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// Declared payload length exceeds [`MAX_PAYLOAD_LEN`].
    #[error("declared payload of {0} bytes exceeds the {MAX_PAYLOAD_LEN} byte ceiling")]
    PayloadTooLarge(usize),
}

impl FrameError {
    /// True when the caller should read more bytes and retry the decode.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}

/// Encode a frame into wire bytes.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + frame.payload.len());
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&frame.command.0.to_be_bytes());
    buf.extend_from_slice(&(frame.payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&frame.payload);
    buf
}

/// Decode one frame from the front of `buf`.
///
/// Returns the frame and the number of bytes consumed so stream readers
/// can drain their buffer. [`FrameError::Incomplete`] is recoverable
/// (read more bytes); the other variants mean the stream is not carrying
/// valid frames and must be torn down.
pub fn decode(buf: &[u8]) -> Result<(Frame, usize), FrameError> {
    if buf.len() < HEADER_LEN {
        return Err(FrameError::Incomplete {
            needed: HEADER_LEN - buf.len(),
        });
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&buf[..4]);
    if magic != MAGIC {
        return Err(FrameError::BadMagic(magic));
    }

    let command = Opcode(u16::from_be_bytes([buf[4], buf[5]]));
    let declared = u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]) as usize;
    if declared > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge(declared));
    }

    let total = HEADER_LEN + declared;
    if buf.len() < total {
        return Err(FrameError::Incomplete {
            needed: total - buf.len(),
        });
    }

    let payload = buf[HEADER_LEN..total].to_vec();
    Ok((Frame { command, payload }, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let frame = Frame::new(Opcode::LOGIN, br#"{"sn":"X1"}"#.to_vec());
        let bytes = encode(&frame);
        let (decoded, consumed) = decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn encode_decode_empty_payload() {
        let frame = Frame::new(Opcode::LIST_PROGRAMS, Vec::new());
        let (decoded, consumed) = decode(&encode(&frame)).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(consumed, HEADER_LEN);
    }

    #[test]
    fn short_header_is_incomplete() {
        let err = decode(b"AVON").unwrap_err();
        assert_eq!(err, FrameError::Incomplete { needed: 6 });
        assert!(err.is_incomplete());
    }

    #[test]
    fn empty_buffer_is_incomplete() {
        assert_eq!(
            decode(&[]).unwrap_err(),
            FrameError::Incomplete { needed: HEADER_LEN }
        );
    }

    #[test]
    fn truncated_payload_is_incomplete() {
        let frame = Frame::new(Opcode::SWITCH_PROGRAM, br#"{"identifier":3}"#.to_vec());
        let bytes = encode(&frame);
        let err = decode(&bytes[..bytes.len() - 4]).unwrap_err();
        assert_eq!(err, FrameError::Incomplete { needed: 4 });
    }

    #[test]
    fn wrong_magic_is_fatal() {
        let mut bytes = encode(&Frame::new(Opcode::LOGIN, b"{}".to_vec()));
        bytes[0] = b'N';
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, FrameError::BadMagic(_)));
        assert!(!err.is_incomplete());
    }

    #[test]
    fn oversize_length_is_fatal() {
        let mut bytes = encode(&Frame::new(Opcode::LOGIN, b"{}".to_vec()));
        bytes[6..10].copy_from_slice(&u32::MAX.to_be_bytes());
        assert_eq!(
            decode(&bytes).unwrap_err(),
            FrameError::PayloadTooLarge(u32::MAX as usize)
        );
    }

    #[test]
    fn decode_leaves_trailing_bytes() {
        let first = Frame::new(Opcode::LOGIN, b"{}".to_vec());
        let second = Frame::new(Opcode::LIST_PROGRAMS, b"{}".to_vec());
        let mut bytes = encode(&first);
        bytes.extend_from_slice(&encode(&second));

        let (decoded, consumed) = decode(&bytes).unwrap();
        assert_eq!(decoded, first);
        let (decoded, _) = decode(&bytes[consumed..]).unwrap();
        assert_eq!(decoded, second);
    }

    #[test]
    fn json_helper_round_trips() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Ping {
            seq: u32,
        }
        let frame = Frame::json(Opcode::LOGIN, &Ping { seq: 9 }).unwrap();
        let parsed: Ping = frame.parse().unwrap();
        assert_eq!(parsed, Ping { seq: 9 });
    }
}
