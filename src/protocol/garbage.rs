//! Bounded accumulator for bytes that could not be framed.

use bytes::{Bytes, BytesMut};

/// Collects unframeable bytes until they are flushed as one Invalid message.
///
/// Never holds more than `limit` bytes: the push that reaches the limit
/// hands the whole run back to the caller.
#[derive(Debug)]
pub struct GarbageBuffer {
    data: BytesMut,
    limit: usize,
}

impl GarbageBuffer {
    /// Create an empty buffer flushing at `limit` bytes.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            data: BytesMut::with_capacity(limit),
            limit,
        }
    }

    /// Append one byte. Returns the full run once the limit is reached.
    pub fn push(&mut self, byte: u8) -> Option<Bytes> {
        self.data.extend_from_slice(&[byte]);
        if self.data.len() >= self.limit {
            return self.take();
        }
        None
    }

    /// Append many bytes, returning every run that reached the limit.
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Bytes> {
        let mut full = Vec::new();
        for &byte in bytes {
            if let Some(run) = self.push(byte) {
                full.push(run);
            }
        }
        full
    }

    /// Take whatever is collected, if anything.
    pub fn take(&mut self) -> Option<Bytes> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.split().freeze())
    }

    /// Number of collected bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if nothing is collected.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flush limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drop collected bytes.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
