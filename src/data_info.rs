//! Raw I/O unit exchanged between sockets, filters and protocols.
//!
//! A [`DataInfo`] is created per I/O event and treated as immutable once it
//! has been handed to the next pipeline stage. Stages that transform data
//! build a new `DataInfo` (usually via [`DataInfo::with_data`]) instead of
//! editing the one they received.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde_json::{Map, Value};

/// Bytes plus the metadata a transport attaches to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataInfo {
    /// Milliseconds since the Unix epoch, if the producer stamped it.
    pub timestamp: Option<u64>,
    /// Raw bytes (zero-copy via `bytes::Bytes`).
    pub data: Bytes,
    /// Open property bag (e.g. remote endpoint description).
    pub extra_properties: Map<String, Value>,
}

impl DataInfo {
    /// Create a new unstamped data unit.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            timestamp: None,
            data: data.into(),
            extra_properties: Map::new(),
        }
    }

    /// Create a data unit stamped with the current wall-clock time.
    pub fn stamped(data: impl Into<Bytes>) -> Self {
        Self {
            timestamp: Some(now_ms()),
            ..Self::new(data)
        }
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Add one extra property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_properties.insert(key.into(), value.into());
        self
    }

    /// Replace the bytes, keeping timestamp and properties.
    pub fn with_data(&self, data: impl Into<Bytes>) -> Self {
        Self {
            timestamp: self.timestamp,
            data: data.into(),
            extra_properties: self.extra_properties.clone(),
        }
    }

    /// Get a reference to the bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes carried.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if no bytes are carried.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
