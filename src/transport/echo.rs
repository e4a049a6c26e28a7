//! In-memory loopback socket.
//!
//! Every byte sent through an [`EchoSocket`] comes straight back as received
//! data, tagged with the [`ECHO_PROPERTY`] extra property. An [`EchoRemote`]
//! handle plays the far end: it can inject data, raise errors and drop the
//! connection while the socket itself is owned by the pipeline.
//!
//! # Example
//!
//! ```
//! use commswire::transport::{EchoSocket, Socket, SocketState};
//!
//! let socket = EchoSocket::new();
//! let remote = socket.remote();
//! assert_eq!(socket.state(), SocketState::Stopped);
//! assert!(!remote.is_connected());
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::{ConnectionProperties, Socket, SocketState};
use crate::data_info::{now_ms, DataInfo};
use crate::error::{CommsError, Result};
use crate::event::SocketEvents;

/// Extra property set on echoed data.
pub const ECHO_PROPERTY: &str = "echo";

#[derive(Debug, Default)]
struct Shared {
    events: Option<SocketEvents>,
    state: SocketState,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Loopback [`Socket`].
#[derive(Debug)]
pub struct EchoSocket {
    shared: Arc<Mutex<Shared>>,
    properties: ConnectionProperties,
}

impl EchoSocket {
    /// Create a socket that connects automatically on start.
    pub fn new() -> Self {
        Self::with_properties(ConnectionProperties::AUTO_CONNECT)
    }

    /// Create a socket with custom connection properties.
    pub fn with_properties(properties: ConnectionProperties) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            properties,
        }
    }

    /// Handle for the far end of the connection.
    pub fn remote(&self) -> EchoRemote {
        EchoRemote {
            shared: self.shared.clone(),
        }
    }
}

impl Default for EchoSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Socket for EchoSocket {
    fn start(&mut self, events: SocketEvents) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.events = Some(events);
        shared.state = SocketState::Started;
        tracing::debug!("Echo socket started");
        Ok(())
    }

    fn stop(&mut self) {
        let mut shared = lock(&self.shared);
        shared.events = None;
        shared.state = SocketState::Stopped;
        tracing::debug!("Echo socket stopped");
    }

    fn connect(&mut self) -> Result<()> {
        let mut shared = lock(&self.shared);
        match shared.state {
            SocketState::Stopped => Err(CommsError::Transport(
                "echo socket is not started".to_string(),
            )),
            SocketState::Started | SocketState::Connected => {
                shared.state = SocketState::Connected;
                Ok(())
            }
        }
    }

    fn disconnect(&mut self) {
        let mut shared = lock(&self.shared);
        if shared.state != SocketState::Connected {
            return;
        }
        shared.state = SocketState::Started;
        if let Some(events) = &shared.events {
            events.disconnected();
        }
    }

    fn send(&mut self, data: DataInfo) {
        let shared = lock(&self.shared);
        let Some(events) = &shared.events else {
            return;
        };
        if shared.state != SocketState::Connected {
            events.error("echo socket is not connected");
            return;
        }

        let mut echoed = data.with_data(data.data.clone());
        echoed.timestamp = Some(now_ms());
        echoed
            .extra_properties
            .insert(ECHO_PROPERTY.to_string(), Value::Bool(true));
        events.data_received(echoed);
    }

    fn state(&self) -> SocketState {
        lock(&self.shared).state
    }

    fn connection_properties(&self) -> ConnectionProperties {
        self.properties
    }
}

/// Far end of an [`EchoSocket`].
#[derive(Debug, Clone)]
pub struct EchoRemote {
    shared: Arc<Mutex<Shared>>,
}

impl EchoRemote {
    /// Deliver data as if the peer sent it. Returns `false` when not connected.
    pub fn inject(&self, data: DataInfo) -> bool {
        let shared = lock(&self.shared);
        match (&shared.events, shared.state) {
            (Some(events), SocketState::Connected) => {
                events.data_received(data);
                true
            }
            _ => false,
        }
    }

    /// Raise a transport error.
    pub fn fail(&self, error: &str) {
        if let Some(events) = &lock(&self.shared).events {
            events.error(error);
        }
    }

    /// Drop the connection from the far end.
    pub fn drop_connection(&self) {
        let mut shared = lock(&self.shared);
        if shared.state != SocketState::Connected {
            return;
        }
        shared.state = SocketState::Started;
        if let Some(events) = &shared.events {
            events.disconnected();
        }
    }

    /// Whether the socket is connected.
    pub fn is_connected(&self) -> bool {
        lock(&self.shared).state == SocketState::Connected
    }
}
