//! Chat message model and protocol constants.
//!
//! A [`ChatMessage`] is one wire-level chunk of user text, not a whole
//! utterance.  Long input is split by the sender into an ordered run of
//! independent messages (see [`crate::protocol::chunking`]); every receiver
//! timestamps and displays each one on its own.  Nothing reassembles them.
//!
//! # Field capacities
//!
//! | Field       | Capacity (chars) |
//! |-------------|------------------|
//! | `origin_ip` | 15               |
//! | `user_name` | 5                |
//! | `text`      | 40 per chunk     |
//!
//! Values longer than their capacity are silently truncated whenever a
//! message crosses an encode or decode boundary.  Truncation counts Unicode
//! scalar values, so a multi-byte character is never split.

use std::fmt;

use chrono::Local;

/// Maximum characters of the originating IPv4 address (`255.255.255.255`).
pub const MAX_IP_LEN: usize = 15;

/// Maximum characters of a user name.
pub const MAX_USERNAME_LEN: usize = 5;

/// Maximum characters of chat text carried by one frame.
pub const MAX_PARCEL_LEN: usize = 40;

/// Longest line the client sender accepts from its input source.
pub const MAX_INPUT_LEN: usize = 80;

/// Chunk text that announces an intentional disconnect.
///
/// The server compares the decoded chunk for exact equality; `">>bye<< "`
/// or `"bye"` are ordinary chat text.
pub const DISCONNECT_SENTINEL: &str = ">>bye<<";

/// Separator between the three fields of a serialized record.
pub const RECORD_DELIMITER: char = '|';

/// Default TCP port of the chat server.
pub const DEFAULT_PORT: u16 = 8989;

/// Default number of concurrently connected clients the server admits.
pub const MAX_CLIENTS: usize = 10;

/// `strftime` pattern of [`ChatMessage::timestamp`].
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Identity of one accepted server connection.
///
/// Stands in for the socket descriptor: the registry, the broadcaster and
/// every message decoded on that connection refer to it by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One chunk of chat text together with its sender identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatMessage {
    /// IPv4 address of the client that typed the text.
    pub origin_ip: String,
    /// Display name of the sender.
    pub user_name: String,
    /// The chunk of text (at most [`MAX_PARCEL_LEN`] chars once on the wire).
    pub text: String,
    /// Local wall-clock time formatted with [`TIMESTAMP_FORMAT`].
    pub timestamp: String,
    /// Server-side connection the message arrived on; `None` on clients.
    pub origin: Option<ConnectionId>,
}

impl ChatMessage {
    /// Builds a message stamped with the current local time.
    pub fn new(origin_ip: &str, user_name: &str, text: &str) -> Self {
        Self {
            origin_ip: truncate_chars(origin_ip, MAX_IP_LEN),
            user_name: truncate_chars(user_name, MAX_USERNAME_LEN),
            text: text.to_string(),
            timestamp: current_timestamp(),
            origin: None,
        }
    }

    /// Replaces the timestamp with the current local time.
    pub fn stamp_now(&mut self) {
        self.timestamp = current_timestamp();
    }

    /// Returns `true` when the text is exactly the disconnect sentinel.
    pub fn is_disconnect(&self) -> bool {
        self.text == DISCONNECT_SENTINEL
    }
}

/// Returns the current local time formatted as `HH:MM:SS`.
pub fn current_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Returns at most the first `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}
