//! Display use case: drain the mailbox into a [`MessageSink`].
//!
//! Lines are laid out in fixed columns:
//!
//! ```text
//! 192.168.0.5     [alice] >> see you at noon                           (12:01:09)
//! 192.168.0.9     [bob  ] << ok                                        (12:01:14)
//! ```
//!
//! `>>` marks messages whose origin IP is this client's own, `<<` everyone
//! else's.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chat_core::{ChatMessage, Mailbox};
use tracing::warn;

/// How long the display loop waits for a message before re-checking the
/// terminate flag.
pub const DISPLAY_POLL: Duration = Duration::from_millis(100);

/// Where received messages are shown.
#[cfg_attr(test, mockall::automock)]
pub trait MessageSink {
    fn render(&mut self, message: &ChatMessage, own_ip: &str) -> io::Result<()>;
}

/// Formats `message` as one display line (without a newline).
pub fn format_line(message: &ChatMessage, own_ip: &str) -> String {
    let direction = if message.origin_ip == own_ip { ">>" } else { "<<" };
    format!(
        "{:<15} [{:<5}] {direction} {:<40} ({})",
        message.origin_ip, message.user_name, message.text, message.timestamp
    )
}

/// Renders messages until `terminate` is set, then renders whatever is
/// still queued.  Returns the number of messages rendered.
///
/// A sink error is logged and the message skipped.
pub fn run_display<S: MessageSink + ?Sized>(
    mailbox: &Mailbox,
    sink: &mut S,
    own_ip: &str,
    terminate: &AtomicBool,
) -> usize {
    let mut rendered = 0;
    let mut show = |message: ChatMessage| match sink.render(&message, own_ip) {
        Ok(()) => rendered += 1,
        Err(e) => warn!("failed to display message: {e}"),
    };

    while !terminate.load(Ordering::SeqCst) {
        if let Some(message) = mailbox.dequeue_timeout(DISPLAY_POLL) {
            show(message);
        }
    }
    while let Some(message) = mailbox.try_dequeue() {
        show(message);
    }
    rendered
}
