//! Orderly server teardown.
//!
//! A termination signal only clears the running flag (see `main.rs`).  The
//! main thread notices, leaves the accept loop, and then runs
//! [`ShutdownCoordinator::run`], which releases everything in this order:
//!
//! 1. Clear the running flag.
//! 2. Half-close every registered connection's read side, then join every
//!    connection handler thread.
//! 3. Cancel and join the broadcaster.
//! 4. Close whatever is still in the registry and empty it.
//! 5. Close the listening socket.
//! 6. Drain and release the mailbox.
//!
//! Each step tolerates having nothing to do, and the sequence as a whole
//! runs at most once; later calls return an empty report.

use std::net::TcpListener;
use std::sync::Arc;
use std::thread::JoinHandle;

use chat_core::ConnectionId;
use tracing::{debug, info, warn};

use crate::application::broadcast::BroadcasterHandle;
use crate::application::context::ServerContext;
use crate::application::handle_connection::HandlerExit;

use super::tcp_connection::TcpConnection;

/// What a shutdown run released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub handlers_joined: usize,
    pub connections_closed: usize,
    pub messages_discarded: usize,
    pub listener_closed: bool,
}

/// Tracks the server's threads and tears them down in order.
pub struct ShutdownCoordinator {
    context: Arc<ServerContext<TcpConnection>>,
    handlers: Vec<(ConnectionId, JoinHandle<HandlerExit>)>,
    broadcaster: Option<BroadcasterHandle>,
    completed: bool,
}

impl ShutdownCoordinator {
    pub fn new(context: Arc<ServerContext<TcpConnection>>) -> Self {
        Self {
            context,
            handlers: Vec::new(),
            broadcaster: None,
            completed: false,
        }
    }

    /// Records a spawned connection handler thread.
    pub fn track_handler(&mut self, id: ConnectionId, thread: JoinHandle<HandlerExit>) {
        self.handlers.push((id, thread));
    }

    /// Records the broadcaster thread.
    pub fn set_broadcaster(&mut self, handle: BroadcasterHandle) {
        self.broadcaster = Some(handle);
    }

    /// Joins handler threads that have already finished.
    ///
    /// Called from the accept loop so the list does not grow with every
    /// connection ever made.  Returns how many were reaped.
    pub fn reap_finished_handlers(&mut self) -> usize {
        let before = self.handlers.len();
        let (finished, live): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.handlers).into_iter().partition(|(_, t)| t.is_finished());
        self.handlers = live;
        for (id, thread) in finished {
            join_handler(id, thread);
        }
        before - self.handlers.len()
    }

    /// Number of handler threads not yet joined.
    pub fn tracked_handlers(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Runs the shutdown sequence; `listener` is closed in step 5.
    ///
    /// A second call is a no-op returning an empty report.
    pub fn run(&mut self, listener: Option<TcpListener>) -> ShutdownReport {
        if self.completed {
            debug!("shutdown already completed");
            return ShutdownReport::default();
        }
        let mut report = ShutdownReport::default();

        // 1. stop admitting work
        if self.context.stop() {
            info!("shutdown started");
        }

        // 2. unblock and join handlers
        self.context.registry().shutdown_reads();
        for (id, thread) in self.handlers.drain(..) {
            join_handler(id, thread);
            report.handlers_joined += 1;
        }

        // 3. broadcaster
        if let Some(broadcaster) = self.broadcaster.take() {
            match broadcaster.cancel_and_join(self.context.mailbox()) {
                Some(stats) => debug!("broadcaster joined: {stats:?}"),
                None => warn!("broadcaster thread panicked"),
            }
        }

        // 4. anything still registered
        report.connections_closed = self.context.registry().close_all();

        // 5. listening socket
        if let Some(listener) = listener {
            drop(listener);
            report.listener_closed = true;
        }

        // 6. mailbox
        report.messages_discarded = self.context.mailbox().drain_and_release();

        self.completed = true;
        info!(
            "shutdown complete: {} handler(s) joined, {} connection(s) closed, {} message(s) discarded",
            report.handlers_joined, report.connections_closed, report.messages_discarded
        );
        report
    }
}

fn join_handler(id: ConnectionId, thread: JoinHandle<HandlerExit>) {
    match thread.join() {
        Ok(exit) => debug!("{id} handler joined ({exit:?})"),
        Err(_) => warn!("{id} handler thread panicked"),
    }
}
