//! Thread-safe FIFO mailbox between network threads and a consumer.
//!
//! On the server, every connection handler thread enqueues decoded messages
//! and the single broadcaster thread dequeues them.  On the client, the
//! listener thread enqueues and the display loop drains.
//!
//! # Synchronisation
//!
//! One `parking_lot::Mutex` guards the queue and its flags; one `Condvar`
//! wakes consumers.  Ordering is strict per producer: two messages enqueued
//! by the same thread come out in that order.  Interleaving between
//! producers is whatever order they won the lock in.
//!
//! # Lifecycle
//!
//! [`Mailbox::drain_and_release`] discards whatever is left and marks the
//! mailbox released.  Blocked consumers wake up with `None`, later
//! `enqueue` calls are dropped, and later dequeues return `None` at once.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::protocol::messages::ChatMessage;

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<ChatMessage>,
    released: bool,
    /// Bumped by [`Mailbox::interrupt`]; a waiter that sees it change gives up.
    interrupts: u64,
}

/// Unbounded FIFO of [`ChatMessage`] with blocking dequeue.
#[derive(Debug, Default)]
pub struct Mailbox {
    state: Mutex<State>,
    ready: Condvar,
}

impl Mailbox {
    /// Creates an empty, open mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` at the tail and wakes one waiting consumer.
    pub fn enqueue(&self, message: ChatMessage) {
        let mut state = self.state.lock();
        if state.released {
            debug!("mailbox released; dropping message from {}", message.user_name);
            return;
        }
        state.queue.push_back(message);
        drop(state);
        self.ready.notify_one();
    }

    /// Removes the head, blocking until a message arrives.
    ///
    /// Returns `None` once the mailbox is released or a consumer is
    /// interrupted.
    pub fn dequeue(&self) -> Option<ChatMessage> {
        let mut state = self.state.lock();
        let seen = state.interrupts;
        loop {
            if let Some(message) = state.queue.pop_front() {
                return Some(message);
            }
            if state.released || state.interrupts != seen {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `timeout`.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<ChatMessage> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        let seen = state.interrupts;
        loop {
            if let Some(message) = state.queue.pop_front() {
                return Some(message);
            }
            if state.released || state.interrupts != seen {
                return None;
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return state.queue.pop_front();
            }
        }
    }

    /// Removes the head without blocking.
    pub fn try_dequeue(&self) -> Option<ChatMessage> {
        self.state.lock().queue.pop_front()
    }

    /// Wakes every blocked consumer; each returns `None` from its current wait.
    ///
    /// Queued messages are kept.
    pub fn interrupt(&self) {
        self.state.lock().interrupts += 1;
        self.ready.notify_all();
    }

    /// Discards remaining messages, releases the mailbox and wakes all waiters.
    ///
    /// Returns the number of discarded messages.  Calling it again is a
    /// no-op returning 0.
    pub fn drain_and_release(&self) -> usize {
        let mut state = self.state.lock();
        let discarded = state.queue.len();
        state.queue.clear();
        state.released = true;
        drop(state);
        self.ready.notify_all();
        discarded
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`drain_and_release`](Self::drain_and_release) ran.
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }
}
