//! Session - the orchestrator and the scheduler as one context object.
//!
//! A [`Session`] is built once with [`SessionBuilder`] and driven from a
//! single task. [`Session::run_once`] waits for whichever comes first, a
//! socket/filter event or the scheduler's timer, and handles it:
//!
//! ```text
//!              ┌──────── PipelineEvent ◄── Socket / Filters
//! run_once ◄───┤
//!              └──────── MsgSendMgr::tick ──► MsgMgr::send_msgs
//! ```
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() -> commswire::Result<()> {
//! use commswire::demo::{self, DemoMessage};
//! use commswire::transport::EchoSocket;
//! use commswire::{Message, Session};
//!
//! let mut session = Session::builder()
//!     .socket(EchoSocket::new())
//!     .protocol(demo::protocol())
//!     .start()?;
//!
//! let mut ping = Message::new(DemoMessage::Heartbeat { counter: 1 });
//! ping.props.repeat_duration = 10;
//! ping.props.repeat_count = 3;
//! session.start_sending([ping])?;
//! session.run_until_complete().await;
//!
//! // Three sent, three echoed back.
//! assert_eq!(session.msg_mgr().all_msgs().len(), 6);
//! # Ok(())
//! # }
//! ```

use crate::config::MsgMgrConfig;
use crate::error::{CommsError, Result};
use crate::event::PipelineEvent;
use crate::filter::Filter;
use crate::message::{Message, MessagePtr};
use crate::msg_mgr::MsgMgr;
use crate::protocol::Protocol;
use crate::send_mgr::MsgSendMgr;
use crate::transport::Socket;

/// Builder for a [`Session`].
#[derive(Default)]
pub struct SessionBuilder {
    socket: Option<Box<dyn Socket>>,
    filters: Vec<Box<dyn Filter>>,
    protocol: Option<Box<dyn Protocol>>,
    config: MsgMgrConfig,
}

impl SessionBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the socket.
    pub fn socket(mut self, socket: impl Socket + 'static) -> Self {
        self.socket = Some(Box::new(socket));
        self
    }

    /// Append a filter (closest to the protocol so far).
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Set the protocol.
    pub fn protocol(mut self, protocol: impl Protocol + 'static) -> Self {
        self.protocol = Some(Box::new(protocol));
        self
    }

    /// Set the orchestrator configuration.
    pub fn config(mut self, config: MsgMgrConfig) -> Self {
        self.config = config;
        self
    }

    /// Build a stopped session.
    pub fn build(self) -> Session {
        let mut msg_mgr = MsgMgr::with_config(self.config);
        if let Some(socket) = self.socket {
            msg_mgr.set_socket(socket);
        }
        if let Some(protocol) = self.protocol {
            msg_mgr.set_protocol(protocol);
        }
        for filter in self.filters {
            msg_mgr.add_filter(filter);
        }
        Session::new(msg_mgr)
    }

    /// Build and start the session.
    pub fn start(self) -> Result<Session> {
        let mut session = self.build();
        session.start()?;
        Ok(session)
    }
}

/// Orchestrator plus scheduler.
pub struct Session {
    msg_mgr: MsgMgr,
    send_mgr: MsgSendMgr,
}

enum Step {
    Event(PipelineEvent),
    Batch(Vec<MessagePtr>),
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Wrap an existing orchestrator.
    pub fn new(msg_mgr: MsgMgr) -> Self {
        Self {
            msg_mgr,
            send_mgr: MsgSendMgr::new(),
        }
    }

    /// Get the orchestrator.
    pub fn msg_mgr(&self) -> &MsgMgr {
        &self.msg_mgr
    }

    /// Get the orchestrator mutably.
    pub fn msg_mgr_mut(&mut self) -> &mut MsgMgr {
        &mut self.msg_mgr
    }

    /// Get the scheduler.
    pub fn send_mgr(&self) -> &MsgSendMgr {
        &self.send_mgr
    }

    /// Get the scheduler mutably.
    pub fn send_mgr_mut(&mut self) -> &mut MsgSendMgr {
        &mut self.send_mgr
    }

    /// Start the pipeline.
    pub fn start(&mut self) -> Result<()> {
        self.msg_mgr.start()
    }

    /// Cancel any send run and stop the pipeline.
    pub fn stop(&mut self) {
        self.send_mgr.stop();
        self.msg_mgr.stop();
    }

    /// Start a send run. The batch due immediately goes out right away.
    pub fn start_sending<I>(&mut self, msgs: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<Message>,
    {
        let protocol = self
            .msg_mgr
            .protocol()
            .ok_or(CommsError::NotAttached("protocol"))?;
        let batch = self.send_mgr.start(protocol, msgs)?;
        self.dispatch(batch);
        Ok(())
    }

    /// Cancel the send run.
    pub fn stop_sending(&mut self) {
        self.send_mgr.stop();
    }

    /// Handle one event or one scheduler batch.
    pub async fn run_once(&mut self) {
        let step = tokio::select! {
            event = self.msg_mgr.next_event() => Step::Event(event),
            batch = self.send_mgr.tick() => Step::Batch(batch),
        };

        match step {
            Step::Event(event) => self.msg_mgr.handle_event(event),
            Step::Batch(batch) => self.dispatch(batch),
        }
    }

    /// Run until the current send run completes, then handle the events
    /// already queued.
    pub async fn run_until_complete(&mut self) {
        while self.send_mgr.is_sending() {
            self.run_once().await;
        }
        self.msg_mgr.process_pending_events();
    }

    fn dispatch(&mut self, batch: Vec<MessagePtr>) {
        if batch.is_empty() {
            return;
        }
        if let Err(e) = self.msg_mgr.send_msgs(&batch) {
            tracing::warn!("Scheduled batch of {} not sent: {}", batch.len(), e);
        }
    }
}
