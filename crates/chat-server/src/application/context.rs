//! Shared server state.
//!
//! One `ServerContext` is created at startup and shared (behind an `Arc`)
//! by the accept loop, every connection handler, the broadcaster and the
//! shutdown coordinator.  It owns the running flag, the connection
//! registry and the inbound mailbox; nothing else in the server is global.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chat_core::{ConnectionId, Mailbox};

use super::manage_clients::{ConnectionRegistry, PeerConnection};

/// Running flag, registry and mailbox shared by every server thread.
pub struct ServerContext<C> {
    running: AtomicBool,
    registry: ConnectionRegistry<C>,
    mailbox: Mailbox,
    next_id: AtomicU64,
}

impl<C: PeerConnection> ServerContext<C> {
    /// Creates a running context whose registry holds `max_clients` entries.
    pub fn new(max_clients: usize) -> Self {
        Self {
            running: AtomicBool::new(true),
            registry: ConnectionRegistry::new(max_clients),
            mailbox: Mailbox::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns `false` once [`stop`](Self::stop) has been called.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clears the running flag.
    ///
    /// Returns `true` if this call is the one that stopped the server.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    /// Allocates the id for a newly accepted connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn registry(&self) -> &ConnectionRegistry<C> {
        &self.registry
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Number of currently registered clients.
    pub fn active_clients(&self) -> usize {
        self.registry.len()
    }
}
