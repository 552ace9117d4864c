//! Broadcast port inbox.
//!
//! An unbounded FIFO of delivered values plus a closed flag. Native
//! threads push, the single managed consumer pops.
//!
//! Pushes take the state lock so that a push can never slip in between the
//! consumer's "queue is empty" check and its wait; pops go straight to the
//! lock-free queue and only take the lock when they have to sleep.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use portcall_core::WireObject;

use crate::sync::lock;

struct InboxState {
    closed: bool,
}

pub struct PortInbox {
    queue: SegQueue<WireObject>,
    state: Mutex<InboxState>,
    ready: Condvar,
}

impl Default for PortInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl PortInbox {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            state: Mutex::new(InboxState { closed: false }),
            ready: Condvar::new(),
        }
    }

    /// Append `value`. Returns `false` (and drops the value) if the inbox
    /// is closed.
    pub fn push(&self, value: WireObject) -> bool {
        let state = lock(&self.state);
        if state.closed {
            return false;
        }
        self.queue.push(value);
        drop(state);
        self.ready.notify_one();
        true
    }

    /// Next value without blocking.
    pub fn try_recv(&self) -> Option<WireObject> {
        self.queue.pop()
    }

    /// Next value, blocking until one arrives. `None` once the inbox is
    /// closed and drained.
    pub fn recv(&self) -> Option<WireObject> {
        loop {
            if let Some(v) = self.queue.pop() {
                return Some(v);
            }
            let mut state = lock(&self.state);
            while self.queue.is_empty() && !state.closed {
                state = self.ready.wait(state).unwrap_or_else(|e| e.into_inner());
            }
            if self.queue.is_empty() && state.closed {
                return None;
            }
        }
    }

    /// Like `recv`, giving up after `timeout`. `Err(())` on timeout.
    #[allow(clippy::result_unit_err)]
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<WireObject>, ()> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(v) = self.queue.pop() {
                return Ok(Some(v));
            }
            let mut state = lock(&self.state);
            while self.queue.is_empty() && !state.closed {
                let now = Instant::now();
                if now >= deadline {
                    return Err(());
                }
                state = self
                    .ready
                    .wait_timeout(state, deadline - now)
                    .unwrap_or_else(|e| e.into_inner())
                    .0;
            }
            if self.queue.is_empty() && state.closed {
                return Ok(None);
            }
        }
    }

    /// Stop accepting values and wake the consumer. Values already queued
    /// can still be drained. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let mut state = lock(&self.state);
        let was_open = !state.closed;
        state.closed = true;
        drop(state);
        self.ready.notify_all();
        was_open
    }

    /// Drop everything still queued. Returns how many values were discarded.
    pub fn discard(&self) -> usize {
        let mut n = 0;
        while self.queue.pop().is_some() {
            n += 1;
        }
        n
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
