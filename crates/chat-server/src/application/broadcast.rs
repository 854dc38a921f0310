//! Fan-out of queued messages to every connected client.
//!
//! A single broadcaster thread drains the server mailbox.  Each message is
//! serialized once and then framed to every registered connection while the
//! registry lock is held, so nobody joins or leaves halfway through a
//! fan-out.  The sender receives its own message too; clients rely on that
//! to display what they typed.
//!
//! Delivery is best effort: a peer whose write fails is logged and skipped,
//! and its own handler will notice the broken connection and deregister.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chat_core::protocol::{serialize_record, ChatMessage};
use chat_core::Mailbox;
use tracing::{debug, info, warn};

use super::context::ServerContext;
use super::manage_clients::PeerConnection;

/// How long an idle broadcaster waits on the mailbox before re-checking its flags.
pub const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Counters reported when the broadcaster stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Messages taken from the mailbox and fanned out.
    pub messages: u64,
    /// Individual peer sends that failed.
    pub failed_sends: u64,
}

/// Mailbox consumer that relays every message to all registered clients.
pub struct Broadcaster<C> {
    context: Arc<ServerContext<C>>,
    cancel: Arc<AtomicBool>,
    stats: BroadcastStats,
}

impl<C: PeerConnection + 'static> Broadcaster<C> {
    pub fn new(context: Arc<ServerContext<C>>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            context,
            cancel,
            stats: BroadcastStats::default(),
        }
    }

    /// Starts a broadcaster on its own thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(context: Arc<ServerContext<C>>) -> io::Result<BroadcasterHandle> {
        let cancel = Arc::new(AtomicBool::new(false));
        let broadcaster = Self::new(context, Arc::clone(&cancel));
        let thread = std::thread::Builder::new()
            .name("chat-broadcast".to_string())
            .spawn(move || broadcaster.run())?;
        Ok(BroadcasterHandle { cancel, thread })
    }

    /// Relays messages until the server stops or the broadcaster is cancelled.
    pub fn run(mut self) -> BroadcastStats {
        info!("broadcaster started");
        while self.should_run() {
            if let Some(message) = self.context.mailbox().dequeue_timeout(IDLE_WAIT) {
                self.broadcast(&message);
            }
        }
        info!(
            "broadcaster stopped after {} message(s), {} failed send(s)",
            self.stats.messages, self.stats.failed_sends
        );
        self.stats
    }

    /// Sends `message` to every registered connection.
    ///
    /// Returns the number of peers that received it.
    pub fn broadcast(&mut self, message: &ChatMessage) -> usize {
        let record = serialize_record(message, &message.text);
        let mut delivered = 0;
        let mut failed = 0;

        self.context.registry().for_each(|id, conn| match conn.send_frame(record.as_bytes()) {
            Ok(()) => delivered += 1,
            Err(e) => {
                warn!("broadcast to {id} failed: {e}");
                failed += 1;
            }
        });

        self.stats.messages += 1;
        self.stats.failed_sends += failed;
        debug!("relayed [{}] to {delivered} client(s)", message.user_name);
        delivered
    }

    pub fn stats(&self) -> BroadcastStats {
        self.stats
    }

    fn should_run(&self) -> bool {
        self.context.is_running() && !self.cancel.load(Ordering::SeqCst)
    }
}

/// Owner's handle on a running broadcaster thread.
pub struct BroadcasterHandle {
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<BroadcastStats>,
}

impl BroadcasterHandle {
    /// Cancels the broadcaster, wakes it if it is waiting on `mailbox`, and
    /// joins the thread.
    ///
    /// Returns `None` if the thread panicked.
    pub fn cancel_and_join(self, mailbox: &Mailbox) -> Option<BroadcastStats> {
        self.cancel.store(true, Ordering::SeqCst);
        mailbox.interrupt();
        self.thread.join().ok()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
