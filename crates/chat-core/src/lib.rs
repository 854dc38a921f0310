//! # chat-core
//!
//! Shared transport core for the parcel-chat server and client: the wire
//! protocol and the mailbox that bridges I/O threads to their consumer.
//!
//! It has no dependency on sockets in particular; framing works on any
//! `std::io::Read` / `std::io::Write`, which keeps it testable in memory.
//!
//! # Architecture overview
//!
//! - **`protocol`** – How chat text travels over a stream connection.
//!   User text is split into parcels of at most 40 characters
//!   (`chunking`), each parcel is written as an `ip|userName|chunk` record
//!   (`record`), and every record is sent as a frame with a 4-byte
//!   big-endian length prefix (`codec`).
//!
//! - **`mailbox`** – A blocking FIFO queue of decoded messages.  The server
//!   uses one to feed its broadcaster; the client uses one to feed its
//!   display.

pub mod mailbox;
pub mod protocol;

pub use mailbox::Mailbox;
pub use protocol::codec::{read_frame, send_parcelled, write_frame, ProtocolError};
pub use protocol::messages::{ChatMessage, ConnectionId};
