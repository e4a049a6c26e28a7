//! Configuration for protocols and the message pipeline.
//!
//! All config structs have sensible defaults and chained setters. They also
//! derive `Deserialize`, so a host application can load them from JSON:
//!
//! ```
//! use commswire::config::ProtocolConfig;
//!
//! let cfg: ProtocolConfig = serde_json::from_str(r#"{"garbage_limit": 128}"#).unwrap();
//! assert_eq!(cfg.garbage_limit, 128);
//! assert_eq!(cfg.buffer_capacity, commswire::config::DEFAULT_BUFFER_CAPACITY);
//! ```

use serde::{Deserialize, Serialize};

/// Default maximum garbage bytes collected before they are flushed.
pub const DEFAULT_GARBAGE_LIMIT: usize = 512;

/// Default initial capacity of the reassembly buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4 * 1024;

/// Configuration for a framed protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Garbage bytes collected before an Invalid message is emitted.
    pub garbage_limit: usize,
    /// Initial capacity of the reassembly buffer.
    pub buffer_capacity: usize,
}

impl ProtocolConfig {
    /// Set the garbage limit (at least 1).
    pub fn garbage_limit(mut self, limit: usize) -> Self {
        self.garbage_limit = limit.max(1);
        self
    }

    /// Set the initial reassembly buffer capacity.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            garbage_limit: DEFAULT_GARBAGE_LIMIT,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Configuration for the message pipeline orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsgMgrConfig {
    /// Flush bytes still buffered in the protocol when the socket disconnects.
    pub flush_on_disconnect: bool,
    /// Report socket errors raised after a user-initiated disconnect.
    pub report_user_disconnect_errors: bool,
}

impl MsgMgrConfig {
    /// Set whether buffered bytes are flushed on disconnect.
    pub fn flush_on_disconnect(mut self, flush: bool) -> Self {
        self.flush_on_disconnect = flush;
        self
    }

    /// Set whether errors after a user-initiated disconnect are reported.
    pub fn report_user_disconnect_errors(mut self, report: bool) -> Self {
        self.report_user_disconnect_errors = report;
        self
    }
}

impl Default for MsgMgrConfig {
    fn default() -> Self {
        Self {
            flush_on_disconnect: true,
            report_user_disconnect_errors: false,
        }
    }
}
