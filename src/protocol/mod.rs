//! Protocol module - message catalog, encode/decode and stream reassembly.
//!
//! Two layers:
//! - [`FrameCodec`] - implemented once per wire protocol. It only knows how
//!   to recognize one frame at the front of a byte slice and how to encode a
//!   single message.
//! - [`Protocol`] - the object-safe capability the pipeline consumes.
//!   [`FramedProtocol`] implements it generically on top of any codec and
//!   owns the reassembly and garbage-recovery loop.
//!
//! # Example
//!
//! ```
//! use commswire::demo::{DemoCodec, DemoMessage};
//! use commswire::protocol::{FramedProtocol, Protocol};
//! use commswire::{DataInfo, Message};
//!
//! let mut protocol = FramedProtocol::new(DemoCodec::new());
//! let msg = Message::new(DemoMessage::Heartbeat { counter: 7 });
//! let data = protocol.write(&msg).unwrap();
//!
//! let msgs = protocol.read(&data, false);
//! assert_eq!(msgs.len(), 1);
//! assert_eq!(msgs[0].id_as_string(), "1");
//! ```

mod framed;
mod garbage;

use bytes::Bytes;

use crate::data_info::DataInfo;
use crate::error::Result;
use crate::message::{Message, MessageBody};

pub use framed::FramedProtocol;
pub use garbage::GarbageBuffer;

/// Outcome of one attempt to read a frame from the front of a buffer.
#[derive(Debug)]
pub enum FrameRead {
    /// A complete frame of `len` bytes decoded into a typed message.
    Frame {
        /// Decoded message.
        body: Box<dyn MessageBody>,
        /// Bytes consumed.
        len: usize,
    },
    /// The buffer holds a frame prefix; wait for more bytes.
    NotEnoughData,
    /// Framing is intact but the payload is invalid; `len` bytes consumed.
    InvalidMsgData {
        /// Bytes consumed.
        len: usize,
    },
    /// No frame starts at the first byte.
    ProtocolError,
    /// The codec recognized a message it cannot construct.
    MsgAllocFailure,
}

/// Outcome of encoding one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    /// Frame bytes were written.
    Success,
    /// Derived fields (length, checksum...) must be refreshed first.
    UpdateRequired,
    /// Message cannot be encoded.
    Failed(String),
}

/// Outcome of [`Protocol::update_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Message or its views changed.
    Changed,
    /// Nothing changed.
    NoChange,
}

/// Wire-protocol specific framing and message catalog.
pub trait FrameCodec: Send + 'static {
    /// Protocol name.
    fn name(&self) -> &str;

    /// Try to read one frame from the front of `buf`.
    fn read_frame(&self, buf: &[u8]) -> FrameRead;

    /// Encode one application message with its transport framing.
    fn write_frame(&self, body: &dyn MessageBody, out: &mut Vec<u8>) -> WriteStatus;

    /// Decode only the transport-layer fields of a complete frame.
    fn transport_view(&self, frame: &[u8]) -> Option<Box<dyn MessageBody>>;

    /// One default-constructed instance of every supported message.
    fn create_all_messages(&self) -> Vec<Box<dyn MessageBody>>;

    /// Create a message by identity. `idx` selects among messages sharing
    /// the same identity.
    fn create_message(&self, id: &str, idx: usize) -> Option<Box<dyn MessageBody>>;

    /// Recompute derived fields. Returns `true` if anything changed.
    fn update_body(&self, body: &mut dyn MessageBody) -> bool {
        body.refresh()
    }
}

/// Protocol capability consumed by the pipeline.
pub trait Protocol: Send {
    /// Protocol name.
    fn name(&self) -> &str;

    /// Feed bytes and return every message they complete, in stream order.
    ///
    /// With `is_final` set, bytes that remain unconsumed are flushed as an
    /// Invalid message instead of being kept for the next call.
    fn read(&mut self, data: &DataInfo, is_final: bool) -> Vec<Message>;

    /// Encode a message into transport bytes.
    fn write(&self, msg: &Message) -> Result<DataInfo>;

    /// One instance of every supported message.
    fn create_all_messages(&self) -> Vec<Message>;

    /// Create a message by identity.
    fn create_message(&self, id: &str, idx: usize) -> Option<Message>;

    /// Refresh derived fields and resynchronize the message's views.
    fn update_message(&self, msg: &mut Message) -> UpdateStatus;

    /// Clone a message, keeping its send settings.
    fn clone_message(&self, msg: &Message) -> Message;

    /// Wrap unclassified bytes.
    fn create_invalid_message(&self, data: Bytes) -> Message;

    /// Drop all buffered bytes.
    fn reset(&mut self);
}
