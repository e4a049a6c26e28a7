//! Transport module - the socket capability the pipeline drives.
//!
//! A socket moves through `Stopped → Started → Connected` and back:
//! - `start()`/`stop()` bracket its ability to raise any event
//! - `connect()`/`disconnect()` bracket data flow
//! - `send()` is fire-and-forget
//!
//! Received data, errors and unsolicited disconnects are reported through
//! the [`SocketEvents`] sink handed over in `start()`, never through
//! blocking reads. Concrete network transports live outside this crate;
//! [`EchoSocket`] is an in-memory loopback implementation.

mod echo;

use std::ops::BitOr;

use crate::data_info::DataInfo;
use crate::error::Result;
use crate::event::SocketEvents;

pub use echo::{EchoRemote, EchoSocket, ECHO_PROPERTY};

/// Static connection properties of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionProperties(u8);

impl ConnectionProperties {
    /// Connect automatically once started.
    pub const AUTO_CONNECT: Self = Self(0b0000_0001);
    /// User-initiated disconnection is not allowed.
    pub const NON_DISCONNECTABLE: Self = Self(0b0000_0010);

    /// No properties.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check if all bits of `other` are set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Auto-connect flag.
    #[inline]
    pub const fn auto_connect(self) -> bool {
        self.contains(Self::AUTO_CONNECT)
    }

    /// Non-disconnectable flag.
    #[inline]
    pub const fn non_disconnectable(self) -> bool {
        self.contains(Self::NON_DISCONNECTABLE)
    }
}

impl BitOr for ConnectionProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Lifecycle state of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketState {
    /// Cannot raise events.
    #[default]
    Stopped,
    /// Running but not exchanging data.
    Started,
    /// Exchanging data.
    Connected,
}

/// Transport capability.
pub trait Socket: Send {
    /// Enable the socket. Events go to `events` until `stop()`.
    fn start(&mut self, events: SocketEvents) -> Result<()>;

    /// Disable the socket. No events are raised afterwards.
    fn stop(&mut self);

    /// Open the data flow.
    fn connect(&mut self) -> Result<()>;

    /// Close the data flow.
    fn disconnect(&mut self);

    /// Send bytes (fire-and-forget).
    fn send(&mut self, data: DataInfo);

    /// Current lifecycle state.
    fn state(&self) -> SocketState;

    /// Static connection properties.
    fn connection_properties(&self) -> ConnectionProperties {
        ConnectionProperties::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_flags() {
        let props = ConnectionProperties::AUTO_CONNECT | ConnectionProperties::NON_DISCONNECTABLE;
        assert!(props.auto_connect());
        assert!(props.non_disconnectable());
        assert_eq!(props.bits(), 0b11);

        let none = ConnectionProperties::empty();
        assert!(!none.auto_connect());
        assert!(!none.non_disconnectable());
        assert_eq!(none, ConnectionProperties::default());
    }

    #[test]
    fn test_default_state_is_stopped() {
        assert_eq!(SocketState::default(), SocketState::Stopped);
    }
}
