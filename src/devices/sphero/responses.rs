//! Buffers between the framer and its consumers
//!
//! [`SyncResponses`] holds acknowledgements until a caller waiting on a
//! sequence number claims one; waiters park on a condition variable instead of
//! polling. [`AsyncResponses`] holds notifications until the dispatcher's next
//! tick.

use super::constants::MIN_REPLY_WITH_DATA;
use super::packet::Frame;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Synchronous acknowledgements awaiting a caller
pub struct SyncResponses {
    frames: Mutex<Vec<Frame>>,
    arrived: Condvar,
    limit: usize,
}

impl SyncResponses {
    /// Buffer holding at most `limit` unclaimed replies
    pub fn new(limit: usize) -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            arrived: Condvar::new(),
            limit: limit.max(1),
        }
    }

    /// Store a reply and wake every waiter
    ///
    /// Drops the oldest reply when the buffer is full.
    pub fn push(&self, frame: Frame) {
        let mut frames = self.frames.lock();
        if frames.len() >= self.limit {
            let stale = frames.remove(0);
            log::debug!(
                "Sphero: Sync buffer full, dropping reply seq={}",
                stale.sequence()
            );
        }
        frames.push(frame);
        drop(frames);
        self.arrived.notify_all();
    }

    /// Block until a reply for `sequence` arrives or `timeout` elapses
    ///
    /// A reply matches when its sequence byte equals `sequence` and it is
    /// long enough to carry data. The matched reply is removed from the buffer.
    pub fn wait_for(&self, sequence: u8, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let mut frames = self.frames.lock();
        loop {
            if let Some(pos) = frames.iter().position(|f| Self::matches(f, sequence)) {
                return Some(frames.remove(pos));
            }
            if self.arrived.wait_until(&mut frames, deadline).timed_out() {
                return frames
                    .iter()
                    .position(|f| Self::matches(f, sequence))
                    .map(|pos| frames.remove(pos));
            }
        }
    }

    fn matches(frame: &Frame, sequence: u8) -> bool {
        frame.len() >= MIN_REPLY_WITH_DATA && frame.sequence() == sequence
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}

/// Asynchronous notifications awaiting dispatch
#[derive(Default)]
pub struct AsyncResponses {
    frames: Mutex<Vec<Frame>>,
}

impl AsyncResponses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, frame: Frame) {
        self.frames.lock().push(frame);
    }

    /// Remove the most recently pushed notification
    pub fn pop(&self) -> Option<Frame> {
        self.frames.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}
