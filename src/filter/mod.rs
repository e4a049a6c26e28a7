//! Filter module - reversible stream transforms between socket and protocol.
//!
//! Filters are applied in declaration order on receive and in reverse order
//! on send:
//!
//! ```text
//!            recv: 0 → 1 → … → n-1
//! Socket ◄──────────────────────────► Protocol
//!            send: n-1 → … → 1 → 0
//! ```
//!
//! Any stage may drop data by returning `None`, which short-circuits the
//! rest of the chain. A filter can also originate outbound data on its own
//! (a handshake, a keep-alive) through [`FilterEvents::data_to_send`]; that
//! data only passes through the filters closer to the socket.

use crate::data_info::DataInfo;
use crate::error::Result;
use crate::event::{EventSender, FilterEvents};

/// Pipeline stage capability.
pub trait Filter: Send {
    /// Enable the filter. Events go to `events` until `stop()`.
    fn start(&mut self, events: FilterEvents) -> Result<()> {
        let _ = events;
        Ok(())
    }

    /// Disable the filter.
    fn stop(&mut self) {}

    /// Transform inbound bytes. `None` drops them.
    fn recv_data(&mut self, data: DataInfo) -> Option<DataInfo> {
        Some(data)
    }

    /// Transform outbound bytes. `None` drops them.
    fn send_data(&mut self, data: DataInfo) -> Option<DataInfo> {
        Some(data)
    }

    /// Socket connected or disconnected.
    fn socket_connection_report(&mut self, connected: bool) {
        let _ = connected;
    }
}

/// Ordered filter sequence.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter (closest to the protocol so far).
    pub fn add(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    /// Number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Start every filter in order. Stops at the first failure.
    pub fn start(&mut self, tx: &EventSender) -> Result<()> {
        for (idx, filter) in self.filters.iter_mut().enumerate() {
            filter.start(FilterEvents::new(tx.clone(), idx))?;
        }
        Ok(())
    }

    /// Stop every filter in order.
    pub fn stop(&mut self) {
        for filter in &mut self.filters {
            filter.stop();
        }
    }

    /// Run inbound data through the chain.
    pub fn recv(&mut self, data: DataInfo) -> Option<DataInfo> {
        let mut data = data;
        for (idx, filter) in self.filters.iter_mut().enumerate() {
            match filter.recv_data(data) {
                Some(next) => data = next,
                None => {
                    tracing::debug!("Filter {} dropped inbound data", idx);
                    return None;
                }
            }
        }
        Some(data)
    }

    /// Run outbound data through the whole chain.
    pub fn send(&mut self, data: DataInfo) -> Option<DataInfo> {
        self.send_from(self.filters.len(), data)
    }

    /// Run data originated by filter `origin` through the filters closer to
    /// the socket (`origin - 1` down to `0`).
    pub fn send_from(&mut self, origin: usize, data: DataInfo) -> Option<DataInfo> {
        let end = origin.min(self.filters.len());
        let mut data = data;
        for idx in (0..end).rev() {
            match self.filters[idx].send_data(data) {
                Some(next) => data = next,
                None => {
                    tracing::debug!("Filter {} dropped outbound data", idx);
                    return None;
                }
            }
        }
        Some(data)
    }

    /// Tell every filter about a socket connection change.
    pub fn socket_connection_report(&mut self, connected: bool) {
        for filter in &mut self.filters {
            filter.socket_connection_report(connected);
        }
    }

    /// Remove all filters.
    pub fn clear(&mut self) {
        self.filters.clear();
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("len", &self.filters.len())
            .finish()
    }
}
