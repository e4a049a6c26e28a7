//! Demo protocol - a small framed wire protocol built on [`FrameCodec`].
//!
//! It exists to exercise the generic engine end to end: sync-byte recovery,
//! length-delimited framing, checksums, a derived field that must be
//! refreshed before encoding, and a transport view.
//!
//! [`FrameCodec`]: crate::protocol::FrameCodec

mod codec;
mod messages;
mod wire_format;

pub use codec::{DemoCodec, PROTOCOL_NAME};
pub use messages::{DemoMessage, TransportMessage, HEARTBEAT_ID, STATUS_ID, TEXT_ID};
pub use wire_format::{
    build_frame, checksum, Header, DEFAULT_MAX_LENGTH, FRAME_OVERHEAD, HEADER_SIZE,
    MAX_PAYLOAD_LEN, SYNC,
};

use crate::protocol::FramedProtocol;

/// Demo protocol with default settings.
pub fn protocol() -> FramedProtocol<DemoCodec> {
    FramedProtocol::new(DemoCodec::new())
}
