//! Bounded registry of connected chat clients.
//!
//! The `ConnectionRegistry` is the server's table of live connections.  It
//! has a fixed capacity (10 by default); each entry is keyed by the
//! connection's [`ConnectionId`], so one connection can never occupy two
//! slots.
//!
//! # Locking
//!
//! A single mutex covers every add, remove and iteration, so membership
//! cannot change while [`ConnectionRegistry::for_each`] is walking the
//! table.  The lock does not wait on anything but the closure passed to
//! `for_each`; a slow peer inside that closure holds up other registry
//! users, not other peers' own receive loops.
//!
//! The entries are ordered by id, which is also accept order, so fan-out
//! visits clients in the order they connected.

use std::collections::BTreeMap;

use chat_core::{ConnectionId, ProtocolError};
use parking_lot::Mutex;
use thiserror::Error;

/// The outbound side of one client connection as seen by the application.
///
/// Implemented over TCP by
/// [`crate::infrastructure::network::tcp_connection::TcpConnection`].
#[cfg_attr(test, mockall::automock)]
pub trait PeerConnection: Send + Sync {
    /// Writes one length-prefixed frame to the peer.
    fn send_frame(&self, payload: &[u8]) -> Result<(), ProtocolError>;

    /// Half-closes the receive side so a blocked read on it returns.
    fn shutdown_read(&self);

    /// Shuts the connection down in both directions.
    fn close(&self);
}

/// Error returned when a connection cannot be registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Every slot is taken.
    #[error("registry full: {capacity} clients already connected")]
    Full { capacity: usize },
    /// The id is already registered.
    #[error("connection {0} is already registered")]
    Duplicate(ConnectionId),
}

/// Fixed-capacity table of live connections.
pub struct ConnectionRegistry<C> {
    capacity: usize,
    slots: Mutex<BTreeMap<ConnectionId, C>>,
}

impl<C: PeerConnection> ConnectionRegistry<C> {
    /// Creates an empty registry holding at most `capacity` connections.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers `conn` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Full`] when every slot is occupied and
    /// [`RegistryError::Duplicate`] when `id` is already present.  The table
    /// is unchanged in both cases.
    pub fn add(&self, id: ConnectionId, conn: C) -> Result<(), RegistryError> {
        let mut slots = self.slots.lock();
        if slots.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        if slots.len() >= self.capacity {
            return Err(RegistryError::Full {
                capacity: self.capacity,
            });
        }
        slots.insert(id, conn);
        Ok(())
    }

    /// Removes and returns the connection registered under `id`, if any.
    pub fn remove(&self, id: ConnectionId) -> Option<C> {
        self.slots.lock().remove(&id)
    }

    /// Runs `f` on every registered connection while holding the lock.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(ConnectionId, &C),
    {
        let slots = self.slots.lock();
        for (id, conn) in slots.iter() {
            f(*id, conn);
        }
    }

    /// Half-closes the read side of every registered connection.
    pub fn shutdown_reads(&self) {
        self.for_each(|_, conn| conn.shutdown_read());
    }

    /// Closes every registered connection and empties the table.
    ///
    /// Returns how many connections were closed.
    pub fn close_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.slots.lock());
        for conn in drained.values() {
            conn.close();
        }
        drained.len()
    }

    /// Returns `true` when `id` is registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.slots.lock().contains_key(&id)
    }

    /// Number of registered connections (the active client count).
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` when every slot is taken.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Maximum number of connections.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
