//! Demo protocol wire format.
//!
//! ```text
//! ┌───────────┬──────────┬───────┬─────────────┬──────────┐
//! │ Sync      │ Length   │ ID    │ Payload     │ Checksum │
//! │ 0xAB 0xCD │ uint16 BE│ 1 byte│ Length-1    │ 1 byte   │
//! └───────────┴──────────┴───────┴─────────────┴──────────┘
//! ```
//!
//! `Length` counts the ID byte plus the payload. The checksum is the
//! wrapping sum of the length, ID and payload bytes.

/// Sync prefix.
pub const SYNC: [u8; 2] = [0xAB, 0xCD];

/// Sync + length + ID.
pub const HEADER_SIZE: usize = 5;

/// Sync + length + checksum: bytes a frame has beyond `Length`.
pub const FRAME_OVERHEAD: usize = 5;

/// Default maximum value of the length field.
pub const DEFAULT_MAX_LENGTH: u16 = 1024;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - 1;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// ID byte plus payload length.
    pub length: u16,
    /// Message identifier.
    pub id: u8,
}

impl Header {
    /// Create a header for a payload of `payload_len` bytes.
    ///
    /// Returns `None` if the payload is longer than [`MAX_PAYLOAD_LEN`].
    pub fn for_payload(id: u8, payload_len: usize) -> Option<Self> {
        let length = u16::try_from(payload_len.checked_add(1)?).ok()?;
        Some(Self { length, id })
    }

    /// Encode header to bytes (Big Endian length).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let len = self.length.to_be_bytes();
        [SYNC[0], SYNC[1], len[0], len[1], self.id]
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if the buffer is too short. Sync bytes are not checked.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            length: u16::from_be_bytes([buf[2], buf[3]]),
            id: buf[4],
        })
    }

    /// Payload length in bytes.
    #[inline]
    pub fn payload_len(&self) -> usize {
        (self.length as usize).saturating_sub(1)
    }

    /// Full frame length in bytes.
    #[inline]
    pub fn frame_len(&self) -> usize {
        self.length as usize + FRAME_OVERHEAD
    }

    /// Check the length field bounds.
    pub fn is_valid(&self, max_length: u16) -> bool {
        self.length >= 1 && self.length <= max_length
    }
}

/// Wrapping sum used as frame checksum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Build a complete frame around a payload.
///
/// # Example
///
/// ```
/// use commswire::demo::{build_frame, SYNC};
///
/// let frame = build_frame(1, &[0x00, 0x05]);
/// assert_eq!(&frame[..2], &SYNC);
/// assert_eq!(frame.len(), 5 + 2 + 1);
/// ```
///
/// # Panics
///
/// Panics if `payload` is longer than [`MAX_PAYLOAD_LEN`].
pub fn build_frame(id: u8, payload: &[u8]) -> Vec<u8> {
    let Some(header) = Header::for_payload(id, payload.len()) else {
        panic!(
            "payload of {} bytes exceeds the {} byte frame limit",
            payload.len(),
            MAX_PAYLOAD_LEN
        );
    };
    let mut buf = Vec::with_capacity(header.frame_len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    let sum = checksum(&buf[SYNC.len()..]);
    buf.push(sum);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::for_payload(3, 10).unwrap();
        let decoded = Header::decode(&original.encode()).unwrap();
        assert_eq!(original, decoded);
        assert_eq!(decoded.payload_len(), 10);
        assert_eq!(decoded.frame_len(), 16);
    }

    #[test]
    fn test_header_big_endian_length() {
        let header = Header { length: 0x0102, id: 9 };
        let bytes = header.encode();
        assert_eq!(bytes, [0xAB, 0xCD, 0x01, 0x02, 9]);
    }

    #[test]
    fn test_payload_length_limit() {
        let header = Header::for_payload(1, MAX_PAYLOAD_LEN).unwrap();
        assert_eq!(header.length, u16::MAX);
        assert!(Header::for_payload(1, MAX_PAYLOAD_LEN + 1).is_none());
        let frame = build_frame(1, &vec![0; MAX_PAYLOAD_LEN]);
        assert_eq!(frame.len(), u16::MAX as usize + FRAME_OVERHEAD);
    }

    #[test]
    #[should_panic(expected = "exceeds the 65534 byte frame limit")]
    fn test_build_frame_rejects_oversized_payload() {
        build_frame(1, &vec![0; MAX_PAYLOAD_LEN + 1]);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(Header::decode(&[0xAB, 0xCD, 0, 1]).is_none());
    }

    #[test]
    fn test_length_bounds() {
        assert!(!Header { length: 0, id: 1 }.is_valid(DEFAULT_MAX_LENGTH));
        assert!(Header { length: 1, id: 1 }.is_valid(DEFAULT_MAX_LENGTH));
        assert!(!Header { length: 2000, id: 1 }.is_valid(DEFAULT_MAX_LENGTH));
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_build_frame_checksum() {
        let frame = build_frame(2, &[1, 2, 3]);
        // length = 4 -> 0x00 0x04
        assert_eq!(&frame[..5], &[0xAB, 0xCD, 0x00, 0x04, 0x02]);
        assert_eq!(*frame.last().unwrap(), 0x04 + 0x02 + 1 + 2 + 3);
    }
}
