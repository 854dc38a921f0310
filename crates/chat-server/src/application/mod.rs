//! Application layer of the chat server.
//!
//! These use cases hold the relay logic: who is connected, what a received
//! frame turns into, and how a message reaches everyone.  They work against
//! the [`manage_clients::PeerConnection`] trait and plain `std::io::Read`
//! rather than sockets, so each one is tested without a network.
//!
//! # Sub-modules
//!
//! - **`context`** – The shared `ServerContext`: running flag, connection
//!   registry and inbound mailbox.
//!
//! - **`manage_clients`** – The bounded `ConnectionRegistry` and the
//!   `PeerConnection` trait it stores.
//!
//! - **`handle_connection`** – The per-connection receive loop that turns
//!   frames into queued messages and honours the `>>bye<<` sentinel.
//!
//! - **`broadcast`** – The single consumer of the mailbox that fans every
//!   message out to all registered clients.

pub mod broadcast;
pub mod context;
pub mod handle_connection;
pub mod manage_clients;
