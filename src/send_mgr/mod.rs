//! Send scheduler - fires messages after their delays and repeats them.
//!
//! [`MsgSendMgr`] is a two-state machine, `Idle` and `Sending`. The queue
//! and the timer deadline only exist inside `Sending`, so "start while
//! already sending" is rejected by the state itself.
//!
//! Each message's `delay` is its offset from the start of the run. A message
//! with `repeat_duration > 0` is scheduled again `repeat_duration` ms after
//! it fires, `repeat_count - 1` more times (forever when `repeat_count` is 0).
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! use commswire::demo::{self, DemoMessage};
//! use commswire::{Message, MsgSendMgr};
//!
//! let protocol = demo::protocol();
//! let first = Message::new(DemoMessage::Heartbeat { counter: 1 });
//! let mut second = Message::new(DemoMessage::Heartbeat { counter: 2 });
//! second.props.delay = 100;
//!
//! let mut sender = MsgSendMgr::new();
//! let batch = sender.start(&protocol, [first, second]).unwrap();
//! assert_eq!(batch.len(), 1);
//!
//! let batch = sender.tick().await;
//! assert_eq!(batch.len(), 1);
//! assert!(!sender.is_sending());
//! # }
//! ```

mod queue;

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{CommsError, Result};
use crate::message::{Message, MessagePtr};
use crate::protocol::Protocol;

pub use queue::SendQueue;

/// Called with every fired batch.
pub type SendMsgsCallback = Box<dyn FnMut(&[MessagePtr]) + Send>;

/// Called once when a run completes.
pub type SendCompleteCallback = Box<dyn FnMut() + Send>;

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Sending {
        queue: SendQueue,
        /// When the head of the queue is due.
        deadline: Instant,
    },
}

/// Timer-driven send scheduler.
#[derive(Default)]
pub struct MsgSendMgr {
    state: State,
    on_send_msgs: Option<SendMsgsCallback>,
    on_complete: Option<SendCompleteCallback>,
}

impl MsgSendMgr {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the callback invoked with every fired batch.
    pub fn on_send_msgs<F>(&mut self, callback: F)
    where
        F: FnMut(&[MessagePtr]) + Send + 'static,
    {
        self.on_send_msgs = Some(Box::new(callback));
    }

    /// Set the callback invoked when a run completes.
    pub fn on_complete<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
    }

    /// Check if a run is in progress.
    pub fn is_sending(&self) -> bool {
        matches!(self.state, State::Sending { .. })
    }

    /// Number of messages still queued.
    pub fn pending(&self) -> usize {
        match &self.state {
            State::Idle => 0,
            State::Sending { queue, .. } => queue.len(),
        }
    }

    /// When the next batch is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Idle => None,
            State::Sending { deadline, .. } => Some(*deadline),
        }
    }

    /// Start a run.
    ///
    /// Every message is cloned through `protocol`; the caller's messages are
    /// never touched. Returns the batch due immediately (possibly empty).
    pub fn start<I>(&mut self, protocol: &dyn Protocol, msgs: I) -> Result<Vec<MessagePtr>>
    where
        I: IntoIterator,
        I::Item: AsRef<Message>,
    {
        if self.is_sending() {
            return Err(CommsError::AlreadySending);
        }

        let mut queue = SendQueue::new();
        for msg in msgs {
            let clone = protocol.clone_message(msg.as_ref());
            let delay = clone.props.delay;
            queue.schedule(clone, delay);
        }

        tracing::debug!("Send run started with {} messages", queue.len());
        let now = Instant::now();
        self.state = State::Sending {
            queue,
            deadline: now,
        };
        Ok(self.fire(now))
    }

    /// Cancel the run. Queued messages are dropped.
    pub fn stop(&mut self) {
        if let State::Sending { queue, .. } = std::mem::take(&mut self.state) {
            tracing::debug!("Send run stopped, {} messages dropped", queue.len());
        }
    }

    /// Wait for the next batch and fire it.
    ///
    /// Never completes while idle. Cancel safe: dropping the future before
    /// the deadline leaves the run untouched.
    pub async fn tick(&mut self) -> Vec<MessagePtr> {
        let Some(deadline) = self.next_deadline() else {
            return std::future::pending().await;
        };
        tokio::time::sleep_until(deadline).await;
        self.fire(deadline)
    }

    fn fire(&mut self, now: Instant) -> Vec<MessagePtr> {
        let State::Sending { queue, deadline } = &mut self.state else {
            return Vec::new();
        };

        let due = queue.take_due();
        for msg in &due {
            if msg.props.repeats_again() {
                let mut again = msg.clone();
                if again.props.repeat_count > 0 {
                    again.props.repeat_count -= 1;
                }
                let delay = again.props.repeat_duration;
                queue.schedule(again, delay);
            }
        }

        let complete = match queue.arm_head() {
            Some(delay) => {
                *deadline = now + Duration::from_millis(delay);
                false
            }
            None => true,
        };
        if complete {
            self.state = State::Idle;
        }

        let batch: Vec<MessagePtr> = due.into_iter().map(Message::into_ptr).collect();
        if !batch.is_empty() {
            if let Some(cb) = self.on_send_msgs.as_mut() {
                cb(&batch);
            }
        }
        if complete {
            tracing::debug!("Send run complete");
            if let Some(cb) = self.on_complete.as_mut() {
                cb();
            }
        }
        batch
    }
}

impl std::fmt::Debug for MsgSendMgr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgSendMgr")
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{self, DemoMessage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn heartbeat(counter: u16, delay: u64, repeat: u64, count: u32) -> Message {
        let mut msg = Message::new(DemoMessage::Heartbeat { counter });
        msg.props.delay = delay;
        msg.props.repeat_duration = repeat;
        msg.props.repeat_count = count;
        msg
    }

    fn counters(batch: &[MessagePtr]) -> Vec<u16> {
        batch
            .iter()
            .map(|m| match m.downcast_ref::<DemoMessage>() {
                Some(DemoMessage::Heartbeat { counter }) => *counter,
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_and_repeats() {
        let protocol = demo::protocol();
        let mut sender = MsgSendMgr::new();
        let completions = Arc::new(AtomicUsize::new(0));
        let c = completions.clone();
        sender.on_complete(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let start = Instant::now();
        let msgs = vec![
            heartbeat(0xA, 0, 0, 1),
            heartbeat(0xB, 100, 0, 1),
            heartbeat(0xC, 100, 50, 3),
        ];
        let first = sender.start(&protocol, &msgs).unwrap();
        assert_eq!(counters(&first), vec![0xA]);

        let batch = sender.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));
        assert_eq!(counters(&batch), vec![0xB, 0xC]);
        assert_eq!(batch[1].props.repeat_count, 3);

        let batch = sender.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(150));
        assert_eq!(counters(&batch), vec![0xC]);
        assert_eq!(batch[0].props.repeat_count, 2);
        assert_eq!(completions.load(Ordering::SeqCst), 0);

        let batch = sender.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(200));
        assert_eq!(batch[0].props.repeat_count, 1);
        assert!(!sender.is_sending());
        assert_eq!(completions.load(Ordering::SeqCst), 1);

        // Caller's messages are untouched.
        assert_eq!(msgs[2].props.repeat_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_sending() {
        let protocol = demo::protocol();
        let mut sender = MsgSendMgr::new();
        sender
            .start(&protocol, vec![heartbeat(1, 10, 0, 1)])
            .unwrap();

        assert!(matches!(
            sender.start(&protocol, vec![heartbeat(2, 0, 0, 1)]),
            Err(CommsError::AlreadySending)
        ));
        assert_eq!(sender.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_drops_queue() {
        let protocol = demo::protocol();
        let mut sender = MsgSendMgr::new();
        let completions = Arc::new(AtomicUsize::new(0));
        let c = completions.clone();
        sender.on_complete(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        sender
            .start(&protocol, vec![heartbeat(1, 10, 0, 1), heartbeat(2, 20, 0, 1)])
            .unwrap();
        sender.stop();

        assert!(!sender.is_sending());
        assert_eq!(sender.next_deadline(), None);
        let idle = tokio::time::timeout(Duration::from_secs(1), sender.tick()).await;
        assert!(idle.is_err());
        assert_eq!(completions.load(Ordering::SeqCst), 0);

        // A new run is accepted after stop.
        assert!(sender.start(&protocol, vec![heartbeat(3, 0, 0, 1)]).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_infinite_repeat() {
        let protocol = demo::protocol();
        let mut sender = MsgSendMgr::new();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = fired.clone();
        sender.on_send_msgs(move |batch| f.lock().unwrap().push(batch.len()));

        let first = sender.start(&protocol, vec![heartbeat(1, 0, 10, 0)]).unwrap();
        assert_eq!(first.len(), 1);
        for _ in 0..5 {
            let batch = sender.tick().await;
            assert_eq!(batch[0].props.repeat_count, 0);
        }

        assert!(sender.is_sending());
        assert_eq!(*fired.lock().unwrap(), vec![1; 6]);
        sender.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_run_completes_immediately() {
        let protocol = demo::protocol();
        let mut sender = MsgSendMgr::new();
        let completions = Arc::new(AtomicUsize::new(0));
        let c = completions.clone();
        sender.on_complete(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let batch = sender.start(&protocol, Vec::<Message>::new()).unwrap();

        assert!(batch.is_empty());
        assert!(!sender.is_sending());
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }
}
