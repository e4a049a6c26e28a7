//! Generic stream reassembly on top of a [`FrameCodec`].
//!
//! Uses `bytes::BytesMut` for the reassembly buffer. Each call to
//! [`FramedProtocol::read`] appends the new bytes and then repeatedly asks
//! the codec for one frame at the front of the buffer:
//!
//! - `Frame` / `InvalidMsgData`: pending garbage is flushed first, then the
//!   frame becomes a message carrying transport and raw-data views
//! - `NotEnoughData`: stop and wait for the next call
//! - `ProtocolError`: one byte moves to the garbage buffer, retry
//! - `MsgAllocFailure`: codec bug, stop consuming this chunk

use bytes::{Buf, Bytes, BytesMut};

use super::garbage::GarbageBuffer;
use super::{FrameCodec, FrameRead, Protocol, UpdateStatus, WriteStatus};
use crate::config::ProtocolConfig;
use crate::data_info::DataInfo;
use crate::error::{CommsError, Result};
use crate::message::{
    ExtraInfoMessage, InvalidMessage, Message, MessageBody, RawDataMessage,
};

/// [`Protocol`] implementation shared by all framed wire protocols.
pub struct FramedProtocol<C> {
    /// Wire-protocol specifics.
    codec: C,
    /// Bytes received but not yet consumed into a frame.
    buffer: BytesMut,
    /// Bytes consumed without belonging to any frame.
    garbage: GarbageBuffer,
}

impl<C: FrameCodec> FramedProtocol<C> {
    /// Create a protocol with default settings.
    pub fn new(codec: C) -> Self {
        Self::with_config(codec, ProtocolConfig::default())
    }

    /// Create a protocol with custom settings.
    pub fn with_config(codec: C, config: ProtocolConfig) -> Self {
        Self {
            codec,
            buffer: BytesMut::with_capacity(config.buffer_capacity),
            garbage: GarbageBuffer::new(config.garbage_limit),
        }
    }

    /// Get the codec.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Number of buffered (unconsumed) bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of collected garbage bytes not yet flushed.
    pub fn garbage_len(&self) -> usize {
        self.garbage.len()
    }

    fn flush_garbage(&mut self, out: &mut Vec<Message>) {
        if let Some(run) = self.garbage.take() {
            tracing::warn!("Flushing {} garbage bytes", run.len());
            out.push(self.create_invalid_message(run));
        }
    }

    /// Attach name, transport view and raw-data view to a framed message.
    fn attach_views(&self, msg: &mut Message, frame: Bytes) {
        msg.props.protocol_name = self.codec.name().to_string();
        msg.props.transport_msg = self.codec.transport_view(&frame).map(|body| {
            let mut view = Message::from_box(body);
            view.props.protocol_name = self.codec.name().to_string();
            view.into_ptr()
        });
        msg.props.raw_data_msg = Some(self.raw_data_message(frame));
    }

    fn raw_data_message(&self, data: Bytes) -> crate::message::MessagePtr {
        let mut raw = Message::new(RawDataMessage::new(data));
        raw.props.protocol_name = self.codec.name().to_string();
        raw.into_ptr()
    }

    /// Remove `len` framed bytes from the front of the buffer.
    fn take_frame(&mut self, len: usize) -> Bytes {
        debug_assert!(len > 0, "codec reported an empty frame");
        debug_assert!(
            len <= self.buffer.len(),
            "codec reported a {} byte frame with {} bytes buffered",
            len,
            self.buffer.len()
        );
        if len == 0 || len > self.buffer.len() {
            tracing::error!(
                "{} reported a {} byte frame with {} bytes buffered",
                self.codec.name(),
                len,
                self.buffer.len()
            );
        }
        let len = len.clamp(1, self.buffer.len());
        self.buffer.split_to(len).freeze()
    }

    fn encode(&self, body: &dyn MessageBody) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match self.codec.write_frame(body, &mut out) {
            WriteStatus::Success => return Ok(out),
            WriteStatus::Failed(reason) => return Err(CommsError::Encode(reason)),
            WriteStatus::UpdateRequired => {}
        }

        // One refresh pass; the message itself is shared and stays untouched.
        let mut refreshed = body.clone_body();
        self.codec.update_body(refreshed.as_mut());
        out.clear();
        match self.codec.write_frame(refreshed.as_ref(), &mut out) {
            WriteStatus::Success => Ok(out),
            WriteStatus::Failed(reason) => Err(CommsError::Encode(reason)),
            WriteStatus::UpdateRequired => Err(CommsError::Encode(format!(
                "{} still requires update after refresh",
                body.name()
            ))),
        }
    }

    /// Bring the extra-info view in line with the extra-info map.
    fn sync_extra_info(&self, msg: &mut Message) -> bool {
        if msg.props.extra_info.is_empty() {
            return msg.props.extra_info_msg.take().is_some();
        }

        let up_to_date = msg
            .props
            .extra_info_msg
            .as_ref()
            .and_then(|m| m.downcast_ref::<ExtraInfoMessage>())
            .is_some_and(|m| m.info == msg.props.extra_info);
        if up_to_date {
            return false;
        }

        let mut info = Message::new(ExtraInfoMessage::new(msg.props.extra_info.clone()));
        info.props.protocol_name = self.codec.name().to_string();
        msg.props.extra_info_msg = Some(info.into_ptr());
        true
    }
}

impl<C: FrameCodec> Protocol for FramedProtocol<C> {
    fn name(&self) -> &str {
        self.codec.name()
    }

    fn read(&mut self, data: &DataInfo, is_final: bool) -> Vec<Message> {
        self.buffer.extend_from_slice(data.data());

        let mut msgs = Vec::new();

        while !self.buffer.is_empty() {
            match self.codec.read_frame(&self.buffer) {
                FrameRead::Frame { body, len } => {
                    self.flush_garbage(&mut msgs);
                    let frame = self.take_frame(len);
                    let mut msg = Message::from_box(body);
                    self.attach_views(&mut msg, frame);
                    msgs.push(msg);
                }

                FrameRead::InvalidMsgData { len } => {
                    self.flush_garbage(&mut msgs);
                    let frame = self.take_frame(len);
                    tracing::debug!("Invalid message data in {} byte frame", frame.len());
                    let mut msg = Message::new(InvalidMessage::new(frame.clone()));
                    self.attach_views(&mut msg, frame);
                    msgs.push(msg);
                }

                FrameRead::NotEnoughData => break,

                FrameRead::ProtocolError => {
                    let byte = self.buffer[0];
                    self.buffer.advance(1);
                    if let Some(run) = self.garbage.push(byte) {
                        tracing::warn!("Garbage limit reached, flushing {} bytes", run.len());
                        msgs.push(self.create_invalid_message(run));
                    }
                }

                FrameRead::MsgAllocFailure => {
                    tracing::error!(
                        "{} failed to allocate a message it claims to support",
                        self.codec.name()
                    );
                    debug_assert!(false, "message allocation failure");
                    return msgs;
                }
            }
        }

        if is_final {
            let rest = self.buffer.split().freeze();
            for run in self.garbage.extend(&rest) {
                msgs.push(self.create_invalid_message(run));
            }
            self.flush_garbage(&mut msgs);
        }

        msgs
    }

    fn write(&self, msg: &Message) -> Result<DataInfo> {
        let bytes = if msg.is_application() {
            self.encode(msg.body())?
        } else {
            // Raw and invalid messages go out as-is.
            msg.encode_payload()
        };

        let mut info = DataInfo::stamped(bytes);
        info.extra_properties = msg.props.extra_info.clone();
        Ok(info)
    }

    fn create_all_messages(&self) -> Vec<Message> {
        self.codec
            .create_all_messages()
            .into_iter()
            .map(|body| {
                let mut msg = Message::from_box(body);
                msg.props.protocol_name = self.codec.name().to_string();
                msg
            })
            .collect()
    }

    fn create_message(&self, id: &str, idx: usize) -> Option<Message> {
        let body = self.codec.create_message(id, idx)?;
        let mut msg = Message::from_box(body);
        msg.props.protocol_name = self.codec.name().to_string();
        Some(msg)
    }

    fn update_message(&self, msg: &mut Message) -> UpdateStatus {
        let mut changed = self.codec.update_body(msg.body_mut());

        if msg.is_application() {
            match self.encode(msg.body()) {
                Ok(frame) => self.attach_views(msg, Bytes::from(frame)),
                Err(e) => tracing::warn!("Cannot refresh views of {}: {}", msg.name(), e),
            }
        } else {
            let data = Bytes::from(msg.encode_payload());
            msg.props.protocol_name = self.codec.name().to_string();
            msg.props.raw_data_msg = Some(self.raw_data_message(data));
        }

        changed |= self.sync_extra_info(msg);

        if changed {
            UpdateStatus::Changed
        } else {
            UpdateStatus::NoChange
        }
    }

    fn clone_message(&self, msg: &Message) -> Message {
        let mut clone = Message::from_box(msg.body().clone_body());
        clone.props.protocol_name = self.codec.name().to_string();
        clone.props.copy_send_settings(&msg.props);
        clone.props.transport_msg = msg.props.transport_msg.clone();
        clone.props.raw_data_msg = msg.props.raw_data_msg.clone();
        clone
    }

    fn create_invalid_message(&self, data: Bytes) -> Message {
        let mut msg = Message::new(InvalidMessage::new(data.clone()));
        msg.props.protocol_name = self.codec.name().to_string();
        msg.props.raw_data_msg = Some(self.raw_data_message(data));
        msg
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.garbage.clear();
    }
}
