//! Network infrastructure for the chat server.
//!
//! # Sub-modules
//!
//! - **`server`** – Binds the listening socket and runs the accept loop;
//!   registers each accepted connection and starts its handler thread.
//!
//! - **`tcp_connection`** – The TCP implementation of `PeerConnection`
//!   stored in the registry.
//!
//! - **`shutdown`** – Tears the server down in a fixed order once the
//!   running flag is cleared.

pub mod server;
pub mod shutdown;
pub mod tcp_connection;
