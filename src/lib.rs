//! # commswire
//!
//! Protocol-agnostic message pipeline for binary communication tools.
//!
//! Bytes flow from a [`Socket`](transport::Socket) through a chain of
//! [`Filter`](filter::Filter)s into a [`Protocol`](protocol::Protocol) that
//! reassembles frames into typed [`Message`]s. Outgoing messages take the
//! same path in reverse. The [`MsgSendMgr`] scheduler fires messages after
//! per-message delays and repeats them on a fixed interval.
//!
//! ## Architecture
//!
//! - **Protocol**: [`FramedProtocol`](protocol::FramedProtocol) owns stream
//!   reassembly and garbage recovery; a wire protocol only implements
//!   [`FrameCodec`](protocol::FrameCodec)
//! - **Orchestrator**: [`MsgMgr`] wires socket, filters and protocol and
//!   keeps the sequenced message history
//! - **Scheduler**: [`MsgSendMgr`] keeps a relative-delay queue and one timer
//! - **Context**: [`Session`] drives both from a single task
//!
//! ## Example
//!
//! ```
//! use commswire::demo::{self, DemoMessage};
//! use commswire::transport::EchoSocket;
//! use commswire::{Message, Session};
//!
//! let mut session = Session::builder()
//!     .socket(EchoSocket::new())
//!     .protocol(demo::protocol())
//!     .start()
//!     .unwrap();
//!
//! session
//!     .msg_mgr_mut()
//!     .send_msgs([Message::new(DemoMessage::text("hello"))])
//!     .unwrap();
//! session.msg_mgr_mut().process_pending_events();
//!
//! assert_eq!(session.msg_mgr().all_msgs().len(), 2);
//! ```

pub mod config;
pub mod data_info;
pub mod demo;
pub mod error;
pub mod event;
pub mod filter;
pub mod message;
pub mod msg_list;
pub mod msg_mgr;
pub mod protocol;
pub mod send_mgr;
pub mod session;
pub mod transport;

pub use data_info::DataInfo;
pub use error::{CommsError, Result};
pub use message::{Message, MessageBody, MessagePtr, MsgProperties, MsgType};
pub use msg_mgr::MsgMgr;
pub use send_mgr::MsgSendMgr;
pub use session::{Session, SessionBuilder};
