//! Events raised by sockets and filters.
//!
//! Sockets and filters never call back into the orchestrator directly.
//! They get a cheap, cloneable sink when started and push events into the
//! orchestrator's unbounded channel; the orchestrator handles them one at a
//! time on its own task.
//!
//! ```text
//! Socket ──► SocketEvents ─┐
//!                          ├─► mpsc::UnboundedSender<PipelineEvent> ─► MsgMgr
//! Filter ──► FilterEvents ─┘
//! ```

use tokio::sync::mpsc;

use crate::data_info::DataInfo;

/// Event delivered to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Socket received bytes.
    SocketData(DataInfo),
    /// Socket reported an I/O error.
    SocketError(String),
    /// Socket lost its connection.
    SocketDisconnected,
    /// Filter originated outbound data on its own.
    FilterData {
        /// Index of the filter in the chain.
        filter: usize,
        /// Data to send towards the socket.
        data: DataInfo,
    },
    /// Filter reported an error.
    FilterError {
        /// Index of the filter in the chain.
        filter: usize,
        /// Error description.
        error: String,
    },
}

/// Sender half of the orchestrator's event channel.
pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

/// Receiver half of the orchestrator's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<PipelineEvent>;

fn deliver(tx: &EventSender, event: PipelineEvent) {
    if tx.send(event).is_err() {
        tracing::debug!("Event dropped, pipeline is gone");
    }
}

/// Callbacks available to a socket.
#[derive(Debug, Clone)]
pub struct SocketEvents {
    tx: EventSender,
}

impl SocketEvents {
    /// Create a socket sink on top of an event channel.
    pub fn new(tx: EventSender) -> Self {
        Self { tx }
    }

    /// Report received bytes.
    pub fn data_received(&self, data: DataInfo) {
        deliver(&self.tx, PipelineEvent::SocketData(data));
    }

    /// Report an I/O error.
    pub fn error(&self, error: impl Into<String>) {
        deliver(&self.tx, PipelineEvent::SocketError(error.into()));
    }

    /// Report loss of connection.
    pub fn disconnected(&self) {
        deliver(&self.tx, PipelineEvent::SocketDisconnected);
    }
}

/// Callbacks available to a filter.
#[derive(Debug, Clone)]
pub struct FilterEvents {
    tx: EventSender,
    index: usize,
}

impl FilterEvents {
    /// Create a sink for the filter at `index`.
    pub fn new(tx: EventSender, index: usize) -> Self {
        Self { tx, index }
    }

    /// Position of the owning filter in the chain.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Send data originated by the filter itself.
    pub fn data_to_send(&self, data: DataInfo) {
        deliver(
            &self.tx,
            PipelineEvent::FilterData {
                filter: self.index,
                data,
            },
        );
    }

    /// Report an error.
    pub fn error(&self, error: impl Into<String>) {
        deliver(
            &self.tx,
            PipelineEvent::FilterError {
                filter: self.index,
                error: error.into(),
            },
        );
    }
}
