//! Listener use case: frames from the server into the local mailbox.
//!
//! Every frame is decoded into its own [`chat_core::ChatMessage`]; parcels
//! of one long line arrive and are shown as separate messages.  The receipt
//! time replaces whatever the sender's clock said.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

use chat_core::protocol::{decode_record, read_frame};
use chat_core::Mailbox;
use tracing::{debug, info, warn};

/// Why the listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// The server closed the connection.
    ServerClosed,
    /// Another part of the client asked to stop.
    Terminated,
    /// Reading from the server failed.
    ReadFailed,
}

/// Receives frames from `reader` into `mailbox` until the connection ends
/// or `terminate` is set.
///
/// On the way out it sets `terminate` and interrupts the mailbox so the
/// display loop notices at once.
pub fn run_listener<R: Read + ?Sized>(reader: &mut R, mailbox: &Mailbox, terminate: &AtomicBool) -> ListenerExit {
    let exit = listen(reader, mailbox, terminate);
    terminate.store(true, Ordering::SeqCst);
    mailbox.interrupt();
    info!("listener stopped ({exit:?})");
    exit
}

fn listen<R: Read + ?Sized>(reader: &mut R, mailbox: &Mailbox, terminate: &AtomicBool) -> ListenerExit {
    loop {
        if terminate.load(Ordering::SeqCst) {
            return ListenerExit::Terminated;
        }
        match read_frame(reader) {
            Ok(Some(payload)) => {
                let mut message = decode_record(&String::from_utf8_lossy(&payload));
                message.stamp_now();
                debug!("received [{}] {} chars", message.user_name, message.text.chars().count());
                mailbox.enqueue(message);
            }
            // Shutting our own socket down to stop the listener shows up
            // as end of stream or as an error.
            Ok(None) if terminate.load(Ordering::SeqCst) => return ListenerExit::Terminated,
            Ok(None) => return ListenerExit::ServerClosed,
            Err(e) => {
                if terminate.load(Ordering::SeqCst) {
                    return ListenerExit::Terminated;
                }
                warn!("lost connection to server: {e}");
                return ListenerExit::ReadFailed;
            }
        }
    }
}
