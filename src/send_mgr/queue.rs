//! Relative-delay send queue.
//!
//! Each entry stores its delay as an offset from the entry before it (the
//! head's offset is from "now"). Inserting only needs a linear scan and
//! integer arithmetic, and the only clock read happens when the owner arms
//! its timer for the head.
//!
//! ```text
//! offsets: [A 0] [B 100] [C 0] [D 50]
//! fires:    +0    +100   +100   +150
//! ```

use std::collections::VecDeque;

use crate::message::Message;

#[derive(Debug)]
struct Entry {
    msg: Message,
    /// Milliseconds after the previous entry.
    delay: u64,
}

/// Ordered queue of messages waiting to be sent.
#[derive(Debug, Default)]
pub struct SendQueue {
    entries: VecDeque<Entry>,
}

impl SendQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert `msg` to fire `delay` ms after the head's reference point.
    ///
    /// The message goes before the first entry whose cumulative delay
    /// exceeds `delay`, so ties keep insertion order. That entry's offset
    /// shrinks by what the new one consumes.
    pub fn schedule(&mut self, msg: Message, delay: u64) {
        let mut remaining = delay;
        let mut idx = 0;
        while let Some(entry) = self.entries.get(idx) {
            if entry.delay > remaining {
                break;
            }
            remaining -= entry.delay;
            idx += 1;
        }

        if let Some(next) = self.entries.get_mut(idx) {
            next.delay -= remaining;
        }
        self.entries.insert(
            idx,
            Entry {
                msg,
                delay: remaining,
            },
        );
    }

    /// Remove the contiguous run of zero-delay entries at the head.
    pub fn take_due(&mut self) -> Vec<Message> {
        let mut due = Vec::new();
        while self.entries.front().is_some_and(|e| e.delay == 0) {
            if let Some(entry) = self.entries.pop_front() {
                due.push(entry.msg);
            }
        }
        due
    }

    /// Return the head's delay and zero it, so it is due when the timer
    /// armed for that delay expires. `None` if the queue is empty.
    pub fn arm_head(&mut self) -> Option<u64> {
        let head = self.entries.front_mut()?;
        Some(std::mem::take(&mut head.delay))
    }

    /// Relative offsets, head first.
    pub fn delays(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.delay).collect()
    }

    /// Queued messages, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.msg)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
