//! Message pipeline orchestrator.
//!
//! [`MsgMgr`] owns one socket, a filter chain, one protocol and the message
//! history. It wires them together:
//!
//! ```text
//! receive: Socket ─► filters 0..n ─► Protocol::read ─► history ─► on_msg_added
//! send:    Message ─► Protocol::write ─► filters n..0 ─► Socket::send ─► history
//! ```
//!
//! Socket and filter events arrive on an unbounded channel and are handled
//! one at a time by [`MsgMgr::handle_event`]; nothing in here blocks.
//!
//! Every message entering the history gets the next sequence number,
//! starting at 1. Numbers are never reused, even after deletions.
//!
//! # Example
//!
//! ```
//! use commswire::demo::{self, DemoMessage};
//! use commswire::transport::EchoSocket;
//! use commswire::{Message, MsgMgr, MsgType};
//!
//! let mut mgr = MsgMgr::new();
//! mgr.set_socket(Box::new(EchoSocket::new()));
//! mgr.set_protocol(Box::new(demo::protocol()));
//! mgr.start().unwrap();
//!
//! mgr.send_msgs(vec![Message::new(DemoMessage::Heartbeat { counter: 1 })]).unwrap();
//! mgr.process_pending_events();
//!
//! let history = mgr.all_msgs();
//! assert_eq!(history.len(), 2);
//! assert_eq!(history[0].props.msg_type, MsgType::Sent);
//! assert_eq!(history[1].props.msg_type, MsgType::Received);
//! ```

use tokio::sync::mpsc;

use crate::config::MsgMgrConfig;
use crate::data_info::{now_ms, DataInfo};
use crate::error::{CommsError, Result};
use crate::event::{EventReceiver, EventSender, PipelineEvent, SocketEvents};
use crate::filter::{Filter, FilterChain};
use crate::message::{Message, MessagePtr, MsgType};
use crate::protocol::Protocol;
use crate::transport::{ConnectionProperties, Socket};

/// Called for every message appended to the history.
pub type MsgAddedCallback = Box<dyn FnMut(MessagePtr) + Send>;

/// Called for transport and filter errors.
pub type ErrorCallback = Box<dyn FnMut(String) + Send>;

/// Called when the socket connects (`true`) or disconnects (`false`).
pub type ConnectionStatusCallback = Box<dyn FnMut(bool) + Send>;

/// Message pipeline orchestrator.
pub struct MsgMgr {
    config: MsgMgrConfig,
    socket: Option<Box<dyn Socket>>,
    protocol: Option<Box<dyn Protocol>>,
    filters: FilterChain,
    /// History, ordered by sequence number.
    all_msgs: Vec<MessagePtr>,
    next_seq: u64,
    running: bool,
    socket_connected: bool,
    /// Set between a user-initiated disconnect and the next connect.
    user_disconnected: bool,
    /// User disconnects whose socket event has not been handled yet.
    pending_user_disconnects: u32,
    events_tx: EventSender,
    events_rx: EventReceiver,
    on_msg_added: Option<MsgAddedCallback>,
    on_error: Option<ErrorCallback>,
    on_connection_status: Option<ConnectionStatusCallback>,
}

impl MsgMgr {
    /// Create an orchestrator with default settings.
    pub fn new() -> Self {
        Self::with_config(MsgMgrConfig::default())
    }

    /// Create an orchestrator with custom settings.
    pub fn with_config(config: MsgMgrConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            socket: None,
            protocol: None,
            filters: FilterChain::new(),
            all_msgs: Vec::new(),
            next_seq: 1,
            running: false,
            socket_connected: false,
            user_disconnected: false,
            pending_user_disconnects: 0,
            events_tx,
            events_rx,
            on_msg_added: None,
            on_error: None,
            on_connection_status: None,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MsgMgrConfig {
        &self.config
    }

    /// Attach the socket, replacing (and stopping) any previous one.
    ///
    /// Events already raised by the old socket are handled first, so its
    /// buffered bytes are flushed before the new connection starts.
    pub fn set_socket(&mut self, socket: Box<dyn Socket>) {
        if let Some(mut old) = self.socket.take() {
            if self.running {
                old.stop();
                self.process_pending_events();
                self.handle_disconnected();
                self.pending_user_disconnects = 0;
            }
        }
        self.socket = Some(socket);
        if self.running {
            if let Err(e) = self.start_socket().and_then(|()| self.auto_connect()) {
                self.report_error(e.to_string());
            }
        }
    }

    /// Attach the protocol.
    pub fn set_protocol(&mut self, protocol: Box<dyn Protocol>) {
        self.protocol = Some(protocol);
    }

    /// Append a filter to the chain (closest to the protocol).
    pub fn add_filter(&mut self, filter: Box<dyn Filter>) {
        self.filters.add(filter);
    }

    /// Get the protocol.
    pub fn protocol(&self) -> Option<&dyn Protocol> {
        self.protocol.as_deref()
    }

    /// Get the protocol mutably.
    pub fn protocol_mut(&mut self) -> Option<&mut (dyn Protocol + 'static)> {
        self.protocol.as_deref_mut()
    }

    /// Get the socket.
    pub fn socket(&self) -> Option<&dyn Socket> {
        self.socket.as_deref()
    }

    /// Connection properties of the attached socket.
    pub fn connection_properties(&self) -> ConnectionProperties {
        self.socket
            .as_ref()
            .map(|s| s.connection_properties())
            .unwrap_or_default()
    }

    /// Set the message-added callback.
    pub fn on_msg_added<F>(&mut self, callback: F)
    where
        F: FnMut(MessagePtr) + Send + 'static,
    {
        self.on_msg_added = Some(Box::new(callback));
    }

    /// Set the error callback.
    pub fn on_error<F>(&mut self, callback: F)
    where
        F: FnMut(String) + Send + 'static,
    {
        self.on_error = Some(Box::new(callback));
    }

    /// Set the connection-status callback.
    pub fn on_connection_status<F>(&mut self, callback: F)
    where
        F: FnMut(bool) + Send + 'static,
    {
        self.on_connection_status = Some(Box::new(callback));
    }

    /// Check if the pipeline is started.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Check if the socket is connected.
    pub fn socket_connected(&self) -> bool {
        self.socket_connected
    }

    /// Start the socket, then the filters, then connect if the socket
    /// asks for auto-connection.
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        if self.socket.is_none() {
            return Err(CommsError::NotAttached("socket"));
        }
        if self.protocol.is_none() {
            return Err(CommsError::NotAttached("protocol"));
        }

        self.running = true;
        if let Err(e) = self.start_socket() {
            self.stop();
            return Err(e);
        }
        if let Err(e) = self.filters.start(&self.events_tx) {
            self.stop();
            return Err(e);
        }

        tracing::debug!("Message pipeline started");
        self.auto_connect()
    }

    fn start_socket(&mut self) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or(CommsError::NotAttached("socket"))?;
        socket.start(SocketEvents::new(self.events_tx.clone()))
    }

    fn auto_connect(&mut self) -> Result<()> {
        if self.connection_properties().auto_connect() {
            self.connect_socket()?;
        }
        Ok(())
    }

    /// Stop the filters, then the socket. Pending events are discarded.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.filters.stop();
        if let Some(socket) = self.socket.as_mut() {
            socket.stop();
        }
        self.mark_disconnected();
        self.running = false;
        self.pending_user_disconnects = 0;

        let mut dropped = 0;
        while self.events_rx.try_recv().is_ok() {
            dropped += 1;
        }
        tracing::debug!("Message pipeline stopped, {} pending events dropped", dropped);
    }

    /// Stop and detach socket, protocol and filters.
    ///
    /// The history is kept.
    pub fn clear(&mut self) {
        self.stop();
        self.socket = None;
        self.protocol = None;
        self.filters.clear();
    }

    /// Connect the socket (user action).
    pub fn connect_socket(&mut self) -> Result<()> {
        if !self.running {
            return Err(CommsError::Transport("pipeline is not started".to_string()));
        }
        let socket = self
            .socket
            .as_mut()
            .ok_or(CommsError::NotAttached("socket"))?;
        socket.connect()?;

        self.user_disconnected = false;
        if !self.socket_connected {
            self.socket_connected = true;
            tracing::debug!("Socket connected");
            self.filters.socket_connection_report(true);
            if let Some(cb) = self.on_connection_status.as_mut() {
                cb(true);
            }
        }
        Ok(())
    }

    /// Disconnect the socket (user action).
    ///
    /// Refused for non-disconnectable sockets.
    pub fn disconnect_socket(&mut self) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or(CommsError::NotAttached("socket"))?;
        if socket.connection_properties().non_disconnectable() {
            return Err(CommsError::Transport(
                "socket does not allow disconnection".to_string(),
            ));
        }

        self.user_disconnected = true;
        socket.disconnect();
        // The socket raises its own disconnect event later; that one is
        // swallowed even if the user reconnects before it is handled.
        if self.socket_connected {
            self.pending_user_disconnects += 1;
        }
        self.handle_disconnected();
        Ok(())
    }

    /// Encode and send messages, in order.
    ///
    /// Messages that fail to encode are reported through the error callback
    /// and skipped; the rest of the batch still goes out.
    pub fn send_msgs<I>(&mut self, msgs: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<Message>,
    {
        if self.protocol.is_none() {
            return Err(CommsError::NotAttached("protocol"));
        }
        if self.socket.is_none() {
            return Err(CommsError::NotAttached("socket"));
        }
        if !self.socket_connected {
            return Err(CommsError::ConnectionClosed);
        }

        for msg in msgs {
            if let Err(e) = self.send_msg(msg.as_ref().clone()) {
                self.report_error(e.to_string());
            }
        }
        Ok(())
    }

    /// Encode and send one message.
    ///
    /// Returns the history entry, or `None` if a filter dropped the data.
    pub fn send_msg(&mut self, mut msg: Message) -> Result<Option<MessagePtr>> {
        let protocol = self
            .protocol
            .as_deref()
            .ok_or(CommsError::NotAttached("protocol"))?;
        let data = protocol.write(&msg)?;

        let Some(data) = self.filters.send(data) else {
            tracing::warn!("Outgoing {} dropped by filters", msg.name());
            return Ok(None);
        };

        msg.props.merge_extra_info(&data.extra_properties);
        protocol.update_message(&mut msg);
        msg.props.msg_type = MsgType::Sent;
        msg.props.timestamp = Some(data.timestamp.unwrap_or_else(now_ms));

        let socket = self
            .socket
            .as_mut()
            .ok_or(CommsError::NotAttached("socket"))?;
        socket.send(data);

        Ok(Some(self.append(msg, true)))
    }

    /// Append externally created messages to the history.
    pub fn add_msgs(&mut self, msgs: Vec<Message>, report_added: bool) -> Vec<MessagePtr> {
        msgs.into_iter()
            .map(|msg| self.append(msg, report_added))
            .collect()
    }

    /// Delete one message by sequence number.
    pub fn delete_msg(&mut self, seq_num: u64) -> bool {
        match self
            .all_msgs
            .binary_search_by_key(&seq_num, |m| m.props.seq_num)
        {
            Ok(idx) => {
                self.all_msgs.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Delete messages by sequence number. Returns how many were removed.
    pub fn delete_msgs(&mut self, seq_nums: &[u64]) -> usize {
        let before = self.all_msgs.len();
        self.all_msgs
            .retain(|m| !seq_nums.contains(&m.props.seq_num));
        before - self.all_msgs.len()
    }

    /// Delete the whole history. Sequence numbers keep increasing.
    pub fn delete_all_msgs(&mut self) {
        self.all_msgs.clear();
    }

    /// History in insertion order.
    pub fn all_msgs(&self) -> &[MessagePtr] {
        &self.all_msgs
    }

    /// Wait for the next socket or filter event.
    pub async fn next_event(&mut self) -> PipelineEvent {
        // `events_tx` lives as long as `self`, so the channel never closes.
        match self.events_rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    /// Handle every event already queued. Returns how many were handled.
    pub fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Handle one socket or filter event.
    pub fn handle_event(&mut self, event: PipelineEvent) {
        if !self.running {
            tracing::debug!("Pipeline stopped, ignoring {:?}", event);
            return;
        }

        match event {
            PipelineEvent::SocketData(data) => self.handle_socket_data(data),

            PipelineEvent::SocketError(error) => {
                if self.user_disconnected && !self.config.report_user_disconnect_errors {
                    tracing::debug!("Suppressed socket error after disconnect: {}", error);
                    return;
                }
                self.report_error(error);
            }

            PipelineEvent::SocketDisconnected => {
                if self.pending_user_disconnects > 0 {
                    self.pending_user_disconnects -= 1;
                    tracing::debug!("Socket confirmed user disconnect");
                    return;
                }
                self.handle_disconnected();
            }

            PipelineEvent::FilterData { filter, data } => {
                if !self.socket_connected {
                    tracing::warn!("Filter {} data dropped, socket is not connected", filter);
                    return;
                }
                let Some(data) = self.filters.send_from(filter, data) else {
                    return;
                };
                if let Some(socket) = self.socket.as_mut() {
                    socket.send(data);
                }
            }

            PipelineEvent::FilterError { filter, error } => {
                self.report_error(format!("filter {}: {}", filter, error));
            }
        }
    }

    fn handle_socket_data(&mut self, data: DataInfo) {
        let Some(data) = self.filters.recv(data) else {
            return;
        };
        let Some(protocol) = self.protocol.as_mut() else {
            tracing::warn!("No protocol attached, dropping {} bytes", data.len());
            return;
        };
        let msgs = protocol.read(&data, false);
        self.add_received(msgs, &data);
    }

    fn handle_disconnected(&mut self) {
        if !self.mark_disconnected() {
            return;
        }
        if !self.config.flush_on_disconnect {
            return;
        }

        let tail = DataInfo::default();
        let msgs = match self.protocol.as_mut() {
            Some(protocol) => protocol.read(&tail, true),
            None => return,
        };
        if !msgs.is_empty() {
            tracing::warn!("Flushed {} buffered messages on disconnect", msgs.len());
        }
        self.add_received(msgs, &tail);
    }

    /// Record a disconnect. Returns `false` if already disconnected.
    fn mark_disconnected(&mut self) -> bool {
        if !self.socket_connected {
            return false;
        }
        self.socket_connected = false;
        tracing::debug!("Socket disconnected");
        self.filters.socket_connection_report(false);
        if let Some(cb) = self.on_connection_status.as_mut() {
            cb(false);
        }
        true
    }

    fn add_received(&mut self, msgs: Vec<Message>, data: &DataInfo) {
        for mut msg in msgs {
            if msg.props.msg_type == MsgType::Invalid {
                msg.props.msg_type = MsgType::Received;
            }
            msg.props.timestamp = Some(data.timestamp.unwrap_or_else(now_ms));
            if msg.props.merge_extra_info(&data.extra_properties) {
                if let Some(protocol) = self.protocol.as_deref() {
                    protocol.update_message(&mut msg);
                }
            }
            self.append(msg, true);
        }
    }

    fn append(&mut self, mut msg: Message, report_added: bool) -> MessagePtr {
        msg.props.seq_num = self.next_seq;
        self.next_seq += 1;

        let ptr = msg.into_ptr();
        self.all_msgs.push(ptr.clone());
        if report_added {
            if let Some(cb) = self.on_msg_added.as_mut() {
                cb(ptr.clone());
            }
        }
        ptr
    }

    fn report_error(&mut self, error: String) {
        tracing::error!("Pipeline error: {}", error);
        if let Some(cb) = self.on_error.as_mut() {
            cb(error);
        }
    }
}

impl Default for MsgMgr {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MsgMgr {
    fn drop(&mut self) {
        self.stop();
    }
}
