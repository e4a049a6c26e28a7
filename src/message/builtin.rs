//! Protocol-independent message bodies.
//!
//! - [`RawDataMessage`] - unmodified frame bytes
//! - [`InvalidMessage`] - bytes that could not be classified
//! - [`ExtraInfoMessage`] - out-of-band extra info rendered as JSON

use std::any::Any;

use bytes::Bytes;
use serde_json::{Map, Value};

use super::{MessageBody, MsgField, PayloadError};

/// Raw bytes of a frame, exposed as a message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDataMessage {
    /// Frame bytes.
    pub data: Bytes,
}

impl RawDataMessage {
    /// Create a raw data message.
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }
}

impl MessageBody for RawDataMessage {
    fn name(&self) -> &str {
        "Raw Data"
    }

    fn id_as_string(&self) -> String {
        String::new()
    }

    fn fields(&self) -> Vec<MsgField> {
        vec![MsgField::new("data", hex::encode(&self.data))]
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data);
    }

    fn decode_payload(&mut self, data: &[u8]) -> Result<(), PayloadError> {
        self.data = Bytes::copy_from_slice(data);
        Ok(())
    }

    fn clone_body(&self) -> Box<dyn MessageBody> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Placeholder for bytes that could not be framed or decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvalidMessage {
    /// Unclassified bytes.
    pub data: Bytes,
}

impl InvalidMessage {
    /// Create an invalid message.
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }
}

impl MessageBody for InvalidMessage {
    fn name(&self) -> &str {
        "Invalid Message"
    }

    fn id_as_string(&self) -> String {
        String::new()
    }

    fn is_valid(&self) -> bool {
        false
    }

    fn fields(&self) -> Vec<MsgField> {
        vec![MsgField::new("data", hex::encode(&self.data))]
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data);
    }

    fn decode_payload(&mut self, data: &[u8]) -> Result<(), PayloadError> {
        self.data = Bytes::copy_from_slice(data);
        Ok(())
    }

    fn clone_body(&self) -> Box<dyn MessageBody> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Extra info map rendered as a JSON text payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraInfoMessage {
    /// The extra info map.
    pub info: Map<String, Value>,
}

impl ExtraInfoMessage {
    /// Create from a map.
    pub fn new(info: Map<String, Value>) -> Self {
        Self { info }
    }

    /// JSON text of the map.
    pub fn text(&self) -> String {
        Value::Object(self.info.clone()).to_string()
    }
}

impl MessageBody for ExtraInfoMessage {
    fn name(&self) -> &str {
        "Extra Info"
    }

    fn id_as_string(&self) -> String {
        String::new()
    }

    fn fields(&self) -> Vec<MsgField> {
        self.info
            .iter()
            .map(|(k, v)| MsgField::new(k.clone(), v.clone()))
            .collect()
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.text().as_bytes());
    }

    fn decode_payload(&mut self, data: &[u8]) -> Result<(), PayloadError> {
        if data.is_empty() {
            self.info.clear();
            return Ok(());
        }

        match serde_json::from_slice::<Value>(data) {
            Ok(Value::Object(map)) => {
                self.info = map;
                Ok(())
            }
            _ => Err(PayloadError::InvalidData),
        }
    }

    fn clone_body(&self) -> Box<dyn MessageBody> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
