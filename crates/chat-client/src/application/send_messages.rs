//! Sender use case: user lines in, parcelled frames out.
//!
//! Each non-empty line becomes one [`ChatMessage`] carrying the client's IP
//! and user name, and is sent with [`send_parcelled`], so a long line leaves
//! as several 40-character records.  Typing `>>bye<<` sends the sentinel and
//! ends the session.  End of input does the same, so a closed stdin still
//! says goodbye to the server.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use chat_core::protocol::{
    send_parcelled, truncate_chars, ChatMessage, DISCONNECT_SENTINEL, MAX_INPUT_LEN, MAX_PARCEL_LEN,
};
use tracing::{debug, error, info};

/// Where user input comes from.
#[cfg_attr(test, mockall::automock)]
pub trait LineSource: Send {
    /// Returns the next line, or `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Who the outgoing messages are from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub local_ip: String,
    pub user_name: String,
}

/// Why the sender stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderExit {
    /// The user typed the sentinel.
    Sentinel,
    /// Input ended; the sentinel was sent on the user's behalf.
    EndOfInput,
    /// Another part of the client asked to stop.
    Terminated,
    /// Writing to the server failed.
    SendFailed,
    /// Reading user input failed.
    InputFailed,
}

/// Normalises a raw input line: strips the line terminator and caps the
/// length at [`MAX_INPUT_LEN`] characters.
pub fn prepare_line(raw: &str) -> String {
    let line = raw.trim_end_matches(&['\n', '\r'][..]);
    truncate_chars(line, MAX_INPUT_LEN)
}

/// Reads lines from `source` and sends them to `writer` until the session ends.
///
/// Sets `terminate` before returning for every reason except
/// [`SenderExit::Terminated`], where it was already set.
pub fn run_sender<S, W>(source: &mut S, writer: &mut W, identity: &SenderIdentity, terminate: &AtomicBool) -> SenderExit
where
    S: LineSource + ?Sized,
    W: Write + ?Sized,
{
    let exit = sender_loop(source, writer, identity, terminate);
    terminate.store(true, Ordering::SeqCst);
    info!("sender stopped ({exit:?})");
    exit
}

fn sender_loop<S, W>(source: &mut S, writer: &mut W, identity: &SenderIdentity, terminate: &AtomicBool) -> SenderExit
where
    S: LineSource + ?Sized,
    W: Write + ?Sized,
{
    while !terminate.load(Ordering::SeqCst) {
        let raw = match source.read_line() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                if let Err(e) = send(writer, identity, DISCONNECT_SENTINEL) {
                    debug!("could not send sentinel at end of input: {e}");
                }
                return SenderExit::EndOfInput;
            }
            Err(e) => {
                error!("failed to read input: {e}");
                return SenderExit::InputFailed;
            }
        };

        // The listener may have ended while we were waiting for input.
        if terminate.load(Ordering::SeqCst) {
            break;
        }

        let text = prepare_line(&raw);
        if text.is_empty() {
            continue;
        }

        if let Err(e) = send(writer, identity, &text) {
            error!("failed to send message: {e}");
            return SenderExit::SendFailed;
        }
        if text == DISCONNECT_SENTINEL {
            return SenderExit::Sentinel;
        }
    }
    SenderExit::Terminated
}

fn send<W: Write + ?Sized>(
    writer: &mut W,
    identity: &SenderIdentity,
    text: &str,
) -> Result<usize, chat_core::ProtocolError> {
    let message = ChatMessage::new(&identity.local_ip, &identity.user_name, text);
    let parcels = send_parcelled(writer, &message, MAX_PARCEL_LEN)?;
    debug!("sent {parcels} parcel(s)");
    Ok(parcels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::protocol::{decode_record, read_frame};
    use mockall::Sequence;
    use std::io::Cursor;

    fn identity() -> SenderIdentity {
        SenderIdentity {
            local_ip: "192.168.0.5".to_string(),
            user_name: "alexander".to_string(),
        }
    }

    fn scripted(lines: &[&str]) -> MockLineSource {
        let mut source = MockLineSource::new();
        let mut seq = Sequence::new();
        for line in lines {
            let line = line.to_string();
            source
                .expect_read_line()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move || Ok(Some(line.clone())));
        }
        source
            .expect_read_line()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(None));
        source
    }

    fn sent_texts(wire: Vec<u8>) -> Vec<ChatMessage> {
        let mut reader = Cursor::new(wire);
        let mut out = Vec::new();
        while let Some(payload) = read_frame(&mut reader).unwrap() {
            out.push(decode_record(&String::from_utf8_lossy(&payload)));
        }
        out
    }

    #[test]
    fn test_prepare_line_strips_terminator_and_caps_length() {
        assert_eq!(prepare_line("hello\r\n"), "hello");
        assert_eq!(prepare_line(&"y".repeat(100)).chars().count(), MAX_INPUT_LEN);
        assert_eq!(prepare_line("\n"), "");
    }

    #[test]
    fn test_lines_are_sent_with_identity_and_truncated_user() {
        // Arrange
        let mut source = scripted(&["hi there\n"]);
        let mut wire = Vec::new();
        let terminate = AtomicBool::new(false);

        // Act
        let exit = run_sender(&mut source, &mut wire, &identity(), &terminate);

        // Assert
        assert_eq!(exit, SenderExit::EndOfInput);
        let sent = sent_texts(wire);
        assert_eq!(sent[0].origin_ip, "192.168.0.5");
        assert_eq!(sent[0].user_name, "alexa");
        assert_eq!(sent[0].text, "hi there");
        assert!(sent[1].is_disconnect(), "end of input sends the sentinel");
        assert!(terminate.load(Ordering::SeqCst));
    }

    #[test]
    fn test_sentinel_ends_sender_after_sending_it() {
        // Arrange: the line after the sentinel must never be read
        let mut source = MockLineSource::new();
        source
            .expect_read_line()
            .times(1)
            .returning(|| Ok(Some(">>bye<<\n".to_string())));
        let mut wire = Vec::new();
        let terminate = AtomicBool::new(false);

        // Act
        let exit = run_sender(&mut source, &mut wire, &identity(), &terminate);

        // Assert
        assert_eq!(exit, SenderExit::Sentinel);
        let sent = sent_texts(wire);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_disconnect());
        assert!(terminate.load(Ordering::SeqCst));
    }

    #[test]
    fn test_empty_lines_are_not_sent() {
        let mut source = scripted(&["\n", "\r\n"]);
        let mut wire = Vec::new();

        run_sender(&mut source, &mut wire, &identity(), &AtomicBool::new(false));

        let sent = sent_texts(wire);
        assert_eq!(sent.len(), 1, "only the end-of-input sentinel");
    }

    #[test]
    fn test_long_line_leaves_as_several_parcels() {
        let line = format!("{}{}", "aaaaaaaaa ".repeat(8), "i".repeat(10));
        let mut source = scripted(&[line.as_str()]);
        let mut wire = Vec::new();

        run_sender(&mut source, &mut wire, &identity(), &AtomicBool::new(false));

        let sent = sent_texts(wire);
        assert_eq!(sent.len(), 4, "three parcels plus the sentinel");
        assert!(sent[..3].iter().all(|m| m.text.chars().count() <= MAX_PARCEL_LEN));
    }

    #[test]
    fn test_terminate_set_while_waiting_drops_the_line() {
        // Arrange: the listener ends while the user is typing
        let terminate = AtomicBool::new(false);
        let mut source = MockLineSource::new();
        source.expect_read_line().times(1).returning(|| Ok(Some("late\n".to_string())));
        let mut wire = Vec::new();

        // Act
        let exit = sender_loop(
            &mut TerminateOnRead {
                inner: &mut source,
                flag: &terminate,
            },
            &mut wire,
            &identity(),
            &terminate,
        );

        // Assert
        assert_eq!(exit, SenderExit::Terminated);
        assert!(wire.is_empty());
    }

    /// Sets the terminate flag as a side effect of reading, like a listener
    /// finishing while the sender is blocked on input.
    struct TerminateOnRead<'a> {
        inner: &'a mut MockLineSource,
        flag: &'a AtomicBool,
    }

    impl LineSource for TerminateOnRead<'_> {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            self.flag.store(true, Ordering::SeqCst);
            self.inner.read_line()
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "server gone"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_send_failure_sets_terminate() {
        let mut source = MockLineSource::new();
        source.expect_read_line().times(1).returning(|| Ok(Some("hello\n".to_string())));
        let terminate = AtomicBool::new(false);

        let exit = run_sender(&mut source, &mut BrokenPipe, &identity(), &terminate);

        assert_eq!(exit, SenderExit::SendFailed);
        assert!(terminate.load(Ordering::SeqCst));
    }

    #[test]
    fn test_input_error_ends_sender() {
        let mut source = MockLineSource::new();
        source
            .expect_read_line()
            .times(1)
            .returning(|| Err(io::Error::new(io::ErrorKind::Other, "tty gone")));

        let exit = run_sender(&mut source, &mut Vec::<u8>::new(), &identity(), &AtomicBool::new(false));

        assert_eq!(exit, SenderExit::InputFailed);
    }
}
