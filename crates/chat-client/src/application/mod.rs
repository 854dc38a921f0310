//! Application layer use cases for the chat client.
//!
//! - **`send_messages`** – Reads user lines from a `LineSource`, turns
//!   them into messages and sends them as parcels.  Handles the `>>bye<<`
//!   sentinel.
//!
//! - **`receive_messages`** – Reads frames from the server and queues one
//!   message per frame on the local mailbox.
//!
//! - **`display`** – Drains the mailbox into a `MessageSink`, marking the
//!   client's own messages.
//!
//! None of them open sockets or touch the terminal; the infrastructure
//! layer supplies streams and the stdin/stdout implementations.

pub mod display;
pub mod receive_messages;
pub mod send_messages;
