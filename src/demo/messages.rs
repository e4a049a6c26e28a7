//! Demo protocol message catalog.

use std::any::Any;

use crate::message::{MessageBody, MsgField, PayloadError};

/// Identifier of [`DemoMessage::Heartbeat`].
pub const HEARTBEAT_ID: u8 = 1;
/// Identifier of [`DemoMessage::Status`].
pub const STATUS_ID: u8 = 2;
/// Identifier of [`DemoMessage::Text`].
pub const TEXT_ID: u8 = 3;

/// All application messages of the demo protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoMessage {
    /// Periodic liveness counter.
    Heartbeat {
        /// Wrapping counter.
        counter: u16,
    },
    /// Device status report.
    Status {
        /// Status flags.
        flags: u8,
        /// Reported value.
        value: u32,
    },
    /// Length-prefixed UTF-8 text.
    Text {
        /// Cached byte length of `text`; refreshed before encoding.
        len: u8,
        /// Text contents.
        text: String,
    },
}

impl DemoMessage {
    /// Create a text message with its length field in sync.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::Text {
            len: text.len().min(u8::MAX as usize) as u8,
            text,
        }
    }

    /// Numeric identifier.
    pub fn id(&self) -> u8 {
        match self {
            Self::Heartbeat { .. } => HEARTBEAT_ID,
            Self::Status { .. } => STATUS_ID,
            Self::Text { .. } => TEXT_ID,
        }
    }

    /// Default-constructed message for an identifier.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            HEARTBEAT_ID => Some(Self::Heartbeat { counter: 0 }),
            STATUS_ID => Some(Self::Status { flags: 0, value: 0 }),
            TEXT_ID => Some(Self::text("")),
            _ => None,
        }
    }

    /// Identifiers of every message, in catalog order.
    pub fn all_ids() -> [u8; 3] {
        [HEARTBEAT_ID, STATUS_ID, TEXT_ID]
    }

    /// Whether derived fields must be refreshed before encoding.
    pub fn needs_refresh(&self) -> bool {
        match self {
            Self::Text { len, text } => *len as usize != text.len(),
            _ => false,
        }
    }
}

impl MessageBody for DemoMessage {
    fn name(&self) -> &str {
        match self {
            Self::Heartbeat { .. } => "Heartbeat",
            Self::Status { .. } => "Status",
            Self::Text { .. } => "Text",
        }
    }

    fn id_as_string(&self) -> String {
        self.id().to_string()
    }

    fn is_valid(&self) -> bool {
        match self {
            Self::Text { text, .. } => text.len() <= u8::MAX as usize,
            _ => true,
        }
    }

    fn fields(&self) -> Vec<MsgField> {
        match self {
            Self::Heartbeat { counter } => vec![MsgField::new("counter", *counter)],
            Self::Status { flags, value } => vec![
                MsgField::new("flags", *flags),
                MsgField::new("value", *value),
            ],
            Self::Text { len, text } => vec![
                MsgField::new("len", *len),
                MsgField::new("text", text.clone()),
            ],
        }
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        match self {
            Self::Heartbeat { counter } => out.extend_from_slice(&counter.to_be_bytes()),
            Self::Status { flags, value } => {
                out.push(*flags);
                out.extend_from_slice(&value.to_be_bytes());
            }
            Self::Text { len, text } => {
                out.push(*len);
                out.extend_from_slice(text.as_bytes());
            }
        }
    }

    fn decode_payload(&mut self, data: &[u8]) -> Result<(), PayloadError> {
        match self {
            Self::Heartbeat { counter } => {
                let bytes: [u8; 2] = fixed(data)?;
                *counter = u16::from_be_bytes(bytes);
            }
            Self::Status { flags, value } => {
                let bytes: [u8; 5] = fixed(data)?;
                *flags = bytes[0];
                *value = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
            }
            Self::Text { len, text } => {
                let (&prefix, rest) = data.split_first().ok_or(PayloadError::NotEnoughData)?;
                if prefix as usize != rest.len() {
                    return Err(PayloadError::InvalidData);
                }
                let decoded =
                    std::str::from_utf8(rest).map_err(|_| PayloadError::InvalidData)?;
                *len = prefix;
                *text = decoded.to_string();
            }
        }
        Ok(())
    }

    fn refresh(&mut self) -> bool {
        match self {
            Self::Text { len, text } => {
                let actual = text.len().min(u8::MAX as usize) as u8;
                if *len == actual {
                    return false;
                }
                *len = actual;
                true
            }
            _ => false,
        }
    }

    fn clone_body(&self) -> Box<dyn MessageBody> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Exactly `N` payload bytes.
fn fixed<const N: usize>(data: &[u8]) -> Result<[u8; N], PayloadError> {
    if data.len() < N {
        return Err(PayloadError::NotEnoughData);
    }
    data.try_into().map_err(|_| PayloadError::InvalidData)
}

/// Transport-layer view of a demo frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportMessage {
    /// Sync prefix.
    pub sync: u16,
    /// Length field.
    pub len: u16,
    /// Message identifier.
    pub id: u8,
    /// Checksum byte.
    pub checksum: u8,
}

impl MessageBody for TransportMessage {
    fn name(&self) -> &str {
        "Demo Transport"
    }

    fn id_as_string(&self) -> String {
        String::new()
    }

    fn fields(&self) -> Vec<MsgField> {
        vec![
            MsgField::new("sync", format!("0x{:04x}", self.sync)),
            MsgField::new("len", self.len),
            MsgField::new("id", self.id),
            MsgField::new("checksum", self.checksum),
        ]
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.sync.to_be_bytes());
        out.extend_from_slice(&self.len.to_be_bytes());
        out.push(self.id);
        out.push(self.checksum);
    }

    fn decode_payload(&mut self, data: &[u8]) -> Result<(), PayloadError> {
        let bytes: [u8; 6] = fixed(data)?;
        self.sync = u16::from_be_bytes([bytes[0], bytes[1]]);
        self.len = u16::from_be_bytes([bytes[2], bytes[3]]);
        self.id = bytes[4];
        self.checksum = bytes[5];
        Ok(())
    }

    fn clone_body(&self) -> Box<dyn MessageBody> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
