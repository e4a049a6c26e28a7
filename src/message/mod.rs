//! Message module - typed protocol messages and their metadata.
//!
//! A [`Message`] pairs a protocol-specific [`MessageBody`] with a typed
//! [`MsgProperties`] bag. Concrete protocols define their catalog as
//! statically-typed bodies (usually one enum) and expose them through the
//! object-safe `MessageBody` trait at the pipeline boundary.
//!
//! Messages are shared as [`MessagePtr`] (`Arc<Message>`) once they enter the
//! history or leave the scheduler. A shared message is never mutated in
//! place; clone it first.

mod builtin;
mod properties;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use builtin::{ExtraInfoMessage, InvalidMessage, RawDataMessage};
pub use properties::{MsgProperties, MsgType};

/// Shared, immutable message handle.
pub type MessagePtr = Arc<Message>;

/// One named field of a message, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct MsgField {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: Value,
}

impl MsgField {
    /// Create a new field.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Why a payload could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload is shorter than the message requires.
    NotEnoughData,
    /// Payload has the right shape but invalid contents.
    InvalidData,
}

/// Protocol-specific message contents.
pub trait MessageBody: fmt::Debug + Send + Sync + 'static {
    /// Human readable message name.
    fn name(&self) -> &str;

    /// Message identity. Empty for non-application messages
    /// (raw data, invalid, transport views).
    fn id_as_string(&self) -> String;

    /// Whether field contents are valid.
    fn is_valid(&self) -> bool {
        true
    }

    /// Fields in declaration order.
    fn fields(&self) -> Vec<MsgField>;

    /// Encode the application payload (no transport framing).
    fn encode_payload(&self, out: &mut Vec<u8>);

    /// Decode the application payload (no transport framing).
    fn decode_payload(&mut self, data: &[u8]) -> Result<(), PayloadError>;

    /// Recompute derived fields. Returns `true` if anything changed.
    fn refresh(&mut self) -> bool {
        false
    }

    /// Clone into a new box.
    fn clone_body(&self) -> Box<dyn MessageBody>;

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
}

/// A message body plus its property bag.
#[derive(Debug)]
pub struct Message {
    body: Box<dyn MessageBody>,
    /// Side-channel metadata.
    pub props: MsgProperties,
}

impl Message {
    /// Wrap a body with empty properties.
    pub fn new<B: MessageBody>(body: B) -> Self {
        Self::from_box(Box::new(body))
    }

    /// Wrap an already boxed body.
    pub fn from_box(body: Box<dyn MessageBody>) -> Self {
        Self {
            body,
            props: MsgProperties::default(),
        }
    }

    /// Get the body.
    #[inline]
    pub fn body(&self) -> &dyn MessageBody {
        self.body.as_ref()
    }

    /// Get the body mutably.
    #[inline]
    pub fn body_mut(&mut self) -> &mut dyn MessageBody {
        self.body.as_mut()
    }

    /// Downcast the body to a concrete type.
    pub fn downcast_ref<T: MessageBody>(&self) -> Option<&T> {
        self.body.as_any().downcast_ref::<T>()
    }

    /// Message name.
    #[inline]
    pub fn name(&self) -> &str {
        self.body.name()
    }

    /// Message identity (empty for non-application messages).
    #[inline]
    pub fn id_as_string(&self) -> String {
        self.body.id_as_string()
    }

    /// Whether this is a typed application message.
    #[inline]
    pub fn is_application(&self) -> bool {
        !self.body.id_as_string().is_empty()
    }

    /// Validity flag.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.body.is_valid()
    }

    /// Ordered field list.
    pub fn fields(&self) -> Vec<MsgField> {
        self.body.fields()
    }

    /// Encode the payload into a new vector.
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.body.encode_payload(&mut out);
        out
    }

    /// Decode the payload into this message.
    pub fn decode_payload(&mut self, data: &[u8]) -> Result<(), PayloadError> {
        self.body.decode_payload(data)
    }

    /// Freeze into a shared handle.
    pub fn into_ptr(self) -> MessagePtr {
        Arc::new(self)
    }
}

impl AsRef<Message> for Message {
    fn as_ref(&self) -> &Message {
        self
    }
}

impl Clone for Message {
    fn clone(&self) -> Self {
        Self {
            body: self.body.clone_body(),
            props: self.props.clone(),
        }
    }
}
