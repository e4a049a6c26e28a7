//! Demo protocol framing.

use super::messages::{DemoMessage, TransportMessage};
use super::wire_format::{checksum, Header, DEFAULT_MAX_LENGTH, FRAME_OVERHEAD, HEADER_SIZE, SYNC};
use crate::message::{MessageBody, PayloadError};
use crate::protocol::{FrameCodec, FrameRead, WriteStatus};

/// Protocol name reported by [`DemoCodec`].
pub const PROTOCOL_NAME: &str = "demo";

/// [`FrameCodec`] for the demo wire format.
#[derive(Debug, Clone)]
pub struct DemoCodec {
    max_length: u16,
}

impl DemoCodec {
    /// Create a codec accepting the default maximum length.
    pub fn new() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    /// Create a codec with a custom maximum length field.
    pub fn with_max_length(max_length: u16) -> Self {
        Self { max_length }
    }
}

impl Default for DemoCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec for DemoCodec {
    fn name(&self) -> &str {
        PROTOCOL_NAME
    }

    fn read_frame(&self, buf: &[u8]) -> FrameRead {
        // Check sync bytes as soon as they arrive.
        for (pos, expected) in SYNC.iter().enumerate() {
            match buf.get(pos) {
                None => return FrameRead::NotEnoughData,
                Some(b) if b != expected => return FrameRead::ProtocolError,
                Some(_) => {}
            }
        }

        let Some(header) = Header::decode(buf) else {
            return FrameRead::NotEnoughData;
        };
        if !header.is_valid(self.max_length) {
            return FrameRead::ProtocolError;
        }

        let frame_len = header.frame_len();
        if buf.len() < frame_len {
            return FrameRead::NotEnoughData;
        }

        let sum_pos = frame_len - 1;
        if checksum(&buf[SYNC.len()..sum_pos]) != buf[sum_pos] {
            return FrameRead::ProtocolError;
        }

        let Some(mut msg) = DemoMessage::from_id(header.id) else {
            return FrameRead::InvalidMsgData { len: frame_len };
        };

        match msg.decode_payload(&buf[HEADER_SIZE..sum_pos]) {
            Ok(()) => FrameRead::Frame {
                body: Box::new(msg),
                len: frame_len,
            },
            Err(PayloadError::NotEnoughData) | Err(PayloadError::InvalidData) => {
                FrameRead::InvalidMsgData { len: frame_len }
            }
        }
    }

    fn write_frame(&self, body: &dyn MessageBody, out: &mut Vec<u8>) -> WriteStatus {
        let Some(msg) = body.as_any().downcast_ref::<DemoMessage>() else {
            return WriteStatus::Failed(format!("{} is not a demo message", body.name()));
        };
        if !msg.is_valid() {
            return WriteStatus::Failed(format!("{} has invalid contents", msg.name()));
        }
        if msg.needs_refresh() {
            return WriteStatus::UpdateRequired;
        }

        let mut payload = Vec::new();
        msg.encode_payload(&mut payload);
        if payload.len() + 1 > self.max_length as usize {
            return WriteStatus::Failed(format!(
                "payload of {} bytes exceeds maximum length {}",
                payload.len(),
                self.max_length
            ));
        }

        out.extend_from_slice(&super::build_frame(msg.id(), &payload));
        WriteStatus::Success
    }

    fn transport_view(&self, frame: &[u8]) -> Option<Box<dyn MessageBody>> {
        let header = Header::decode(frame)?;
        if frame.len() < FRAME_OVERHEAD + 1 {
            return None;
        }
        Some(Box::new(TransportMessage {
            sync: u16::from_be_bytes(SYNC),
            len: header.length,
            id: header.id,
            checksum: *frame.last()?,
        }))
    }

    fn create_all_messages(&self) -> Vec<Box<dyn MessageBody>> {
        DemoMessage::all_ids()
            .into_iter()
            .filter_map(DemoMessage::from_id)
            .map(|m| Box::new(m) as Box<dyn MessageBody>)
            .collect()
    }

    fn create_message(&self, id: &str, idx: usize) -> Option<Box<dyn MessageBody>> {
        if idx != 0 {
            return None;
        }
        let id: u8 = id.trim().parse().ok()?;
        DemoMessage::from_id(id).map(|m| Box::new(m) as Box<dyn MessageBody>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::build_frame;

    fn expect_frame(read: FrameRead) -> (DemoMessage, usize) {
        match read {
            FrameRead::Frame { body, len } => (
                body.as_any().downcast_ref::<DemoMessage>().unwrap().clone(),
                len,
            ),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_read_complete_frame() {
        let codec = DemoCodec::new();
        let bytes = build_frame(1, &[0x00, 0x2A]);
        let (msg, len) = expect_frame(codec.read_frame(&bytes));
        assert_eq!(msg, DemoMessage::Heartbeat { counter: 42 });
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn test_read_ignores_trailing_bytes() {
        let codec = DemoCodec::new();
        let mut bytes = build_frame(1, &[0x00, 0x01]);
        let frame_len = bytes.len();
        bytes.extend_from_slice(&[0xAB, 0xCD, 0x00]);
        let (_, len) = expect_frame(codec.read_frame(&bytes));
        assert_eq!(len, frame_len);
    }

    #[test]
    fn test_bad_sync() {
        let codec = DemoCodec::new();
        assert!(matches!(codec.read_frame(&[0x00]), FrameRead::ProtocolError));
        assert!(matches!(
            codec.read_frame(&[0xAB, 0x00]),
            FrameRead::ProtocolError
        ));
    }

    #[test]
    fn test_partial_frames_need_more_data() {
        let codec = DemoCodec::new();
        let bytes = build_frame(2, &[1, 0, 0, 0, 1]);
        for end in 1..bytes.len() {
            assert!(
                matches!(codec.read_frame(&bytes[..end]), FrameRead::NotEnoughData),
                "prefix of {} bytes",
                end
            );
        }
    }

    #[test]
    fn test_bad_checksum_is_protocol_error() {
        let codec = DemoCodec::new();
        let mut bytes = build_frame(1, &[0, 1]);
        *bytes.last_mut().unwrap() ^= 0xFF;
        assert!(matches!(codec.read_frame(&bytes), FrameRead::ProtocolError));
    }

    #[test]
    fn test_length_out_of_range() {
        let codec = DemoCodec::with_max_length(4);
        let bytes = build_frame(3, &[4, b'a', b'b', b'c', b'd']);
        assert!(matches!(codec.read_frame(&bytes), FrameRead::ProtocolError));
        assert!(matches!(
            codec.read_frame(&[0xAB, 0xCD, 0x00, 0x00, 0x01]),
            FrameRead::ProtocolError
        ));
    }

    #[test]
    fn test_invalid_payload() {
        let codec = DemoCodec::new();
        let bytes = build_frame(1, &[0x01]);
        assert!(matches!(
            codec.read_frame(&bytes),
            FrameRead::InvalidMsgData { len } if len == bytes.len()
        ));
    }

    #[test]
    fn test_write_requires_update_for_stale_length() {
        let codec = DemoCodec::new();
        let stale = DemoMessage::Text {
            len: 0,
            text: "abc".to_string(),
        };
        let mut out = Vec::new();
        assert_eq!(codec.write_frame(&stale, &mut out), WriteStatus::UpdateRequired);
        assert!(out.is_empty());

        assert_eq!(
            codec.write_frame(&DemoMessage::text("abc"), &mut out),
            WriteStatus::Success
        );
        assert_eq!(out, build_frame(3, &[3, b'a', b'b', b'c']));
    }

    #[test]
    fn test_write_rejects_foreign_message() {
        let codec = DemoCodec::new();
        let raw = crate::message::RawDataMessage::default();
        let mut out = Vec::new();
        assert!(matches!(
            codec.write_frame(&raw, &mut out),
            WriteStatus::Failed(_)
        ));
    }

    #[test]
    fn test_transport_view() {
        let codec = DemoCodec::new();
        let bytes = build_frame(2, &[0, 0, 0, 0, 7]);
        let view = codec.transport_view(&bytes).unwrap();
        let view = view.as_any().downcast_ref::<TransportMessage>().unwrap();
        assert_eq!(view.sync, 0xABCD);
        assert_eq!(view.len, 6);
        assert_eq!(view.id, 2);
        assert_eq!(view.checksum, *bytes.last().unwrap());
    }

    #[test]
    fn test_create_message_by_id() {
        let codec = DemoCodec::new();
        assert_eq!(codec.create_message("2", 0).unwrap().id_as_string(), "2");
        assert!(codec.create_message("x", 0).is_none());
        assert!(codec.create_message("2", 1).is_none());
        assert_eq!(codec.create_all_messages().len(), 3);
    }
}
