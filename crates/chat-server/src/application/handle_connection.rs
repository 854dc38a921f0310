//! Per-connection receive loop.
//!
//! Every accepted connection gets its own thread running a
//! [`ConnectionHandler`].  The handler reads frames until the peer leaves,
//! turns each record into a [`ChatMessage`] tagged with the connection id
//! and enqueues it on the server mailbox for the broadcaster.
//!
//! # State machine
//!
//! ```text
//! Receiving ──sentinel / close / shutdown / errors──▶ Deregistering ──▶ Terminated
//! ```
//!
//! Whatever the reason for leaving `Receiving`, the handler removes its
//! connection from the registry (unless shutdown already emptied it) and
//! closes it before terminating, so a slot is never leaked.

use std::io::Read;
use std::sync::Arc;

use chat_core::protocol::{decode_record, read_frame, ProtocolError};
use chat_core::ConnectionId;
use tracing::{debug, info, warn};

use super::context::ServerContext;
use super::manage_clients::PeerConnection;

/// Consecutive failed reads after which a handler gives up on its peer.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 8;

/// Lifecycle of a [`ConnectionHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Receiving,
    Deregistering,
    Terminated,
}

/// Why a handler stopped receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerExit {
    /// The peer sent the disconnect sentinel.
    Sentinel,
    /// The peer closed the connection.
    PeerClosed,
    /// The server is shutting down.
    Shutdown,
    /// Reads kept failing.
    ReadErrors,
}

/// Receive loop for a single connection.
///
/// `R` is the read half of the connection; the write half lives in the
/// registry as a `C`.
pub struct ConnectionHandler<R, C> {
    id: ConnectionId,
    reader: R,
    context: Arc<ServerContext<C>>,
    state: HandlerState,
}

impl<R: Read, C: PeerConnection> ConnectionHandler<R, C> {
    pub fn new(id: ConnectionId, reader: R, context: Arc<ServerContext<C>>) -> Self {
        Self {
            id,
            reader,
            context,
            state: HandlerState::Receiving,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Receives until the peer leaves or the server stops, then deregisters.
    pub fn run(&mut self) -> HandlerExit {
        let exit = self.receive_loop();
        self.deregister(exit);
        exit
    }

    fn receive_loop(&mut self) -> HandlerExit {
        let mut consecutive_errors = 0u32;

        while self.state == HandlerState::Receiving {
            if !self.context.is_running() {
                return HandlerExit::Shutdown;
            }

            match read_frame(&mut self.reader) {
                Ok(Some(payload)) => {
                    consecutive_errors = 0;
                    if let Some(exit) = self.on_frame(&payload) {
                        return exit;
                    }
                }
                Ok(None) => {
                    // A read side half-closed by shutdown looks like an orderly close.
                    return if self.context.is_running() {
                        HandlerExit::PeerClosed
                    } else {
                        HandlerExit::Shutdown
                    };
                }
                Err(ProtocolError::Io(e)) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        "{}: receive failed ({consecutive_errors}/{MAX_CONSECUTIVE_READ_ERRORS}): {e}",
                        self.id
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        return HandlerExit::ReadErrors;
                    }
                }
            }
        }

        HandlerExit::Shutdown
    }

    /// Handles one frame; returns the exit reason if the peer is leaving.
    fn on_frame(&self, payload: &[u8]) -> Option<HandlerExit> {
        let mut message = decode_record(&String::from_utf8_lossy(payload));
        if message.is_disconnect() {
            info!("{}: {} ({}) left the chat", self.id, message.user_name, message.origin_ip);
            return Some(HandlerExit::Sentinel);
        }

        message.stamp_now();
        message.origin = Some(self.id);
        debug!(
            "{}: [{}] {} ({} chars)",
            self.id,
            message.user_name,
            message.origin_ip,
            message.text.chars().count()
        );
        self.context.mailbox().enqueue(message);
        None
    }

    fn deregister(&mut self, exit: HandlerExit) {
        self.state = HandlerState::Deregistering;
        if let Some(conn) = self.context.registry().remove(self.id) {
            conn.close();
        }
        info!(
            "{} disconnected ({exit:?}); {} client(s) connected",
            self.id,
            self.context.active_clients()
        );
        self.state = HandlerState::Terminated;
    }
}
