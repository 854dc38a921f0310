//! Length-prefixed framing over byte streams.
//!
//! Wire format:
//! ```text
//! [payload_len:4][payload:N]
//! ```
//! `payload_len` is an unsigned 32-bit big-endian byte count.  There is no
//! terminator and no nested prefix; frames simply follow each other on the
//! stream.  The codec does not cap the frame size: keeping payloads small
//! is the sender's job (see [`send_parcelled`]).

use std::io::{self, ErrorKind, Read, Write};

use thiserror::Error;
use tracing::trace;

use crate::protocol::chunking::split_into_parcels;
use crate::protocol::messages::ChatMessage;
use crate::protocol::record::serialize_record;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Errors that can occur while framing or sending messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The underlying stream failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// A payload is too long to be described by a 32-bit length prefix.
    #[error("frame payload of {0} bytes does not fit a 32-bit length prefix")]
    FrameTooLarge(usize),

    /// `send_parcelled` was asked to split text into zero-length parcels.
    #[error("parcel limit must be at least one character")]
    InvalidParcelLimit,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Writes one frame: the big-endian payload length followed by the payload.
///
/// # Errors
///
/// Returns [`ProtocolError::FrameTooLarge`] for payloads over `u32::MAX`
/// bytes and [`ProtocolError::Io`] if the writer fails.
///
/// # Examples
///
/// ```rust
/// use chat_core::protocol::codec::{read_frame, write_frame};
///
/// let mut wire = Vec::new();
/// write_frame(&mut wire, b"hi").unwrap();
/// assert_eq!(wire, [0, 0, 0, 2, b'h', b'i']);
///
/// let payload = read_frame(&mut wire.as_slice()).unwrap();
/// assert_eq!(payload.as_deref(), Some(&b"hi"[..]));
/// ```
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError> {
    let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge(payload.len()))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    trace!("wrote frame of {len} bytes");
    Ok(())
}

/// Reads one frame and returns its payload.
///
/// Returns `Ok(None)` when the peer shut the connection down in an orderly
/// way, i.e. a read returned zero bytes while waiting for either the length
/// prefix or the payload.
///
/// # Errors
///
/// Returns [`ProtocolError::Io`] for any other read failure.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    if !fill(reader, &mut prefix)? {
        return Ok(None);
    }
    let len = u32::from_be_bytes(prefix) as usize;

    // Grow the buffer as bytes arrive instead of trusting the prefix up front.
    let mut payload = Vec::new();
    let read = Read::take(&mut *reader, len as u64).read_to_end(&mut payload)?;
    if read < len {
        return Ok(None);
    }
    trace!("read frame of {len} bytes");
    Ok(Some(payload))
}

/// Splits `message.text` into parcels and sends each one as its own frame.
///
/// Every parcel is serialized with the identity of `message`
/// (`ip|userName|parcel`).  Returns the number of frames written; empty text
/// sends nothing.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidParcelLimit`] when `limit` is zero, or the
/// first framing error encountered.  Parcels already sent stay sent.
pub fn send_parcelled<W: Write + ?Sized>(
    writer: &mut W,
    message: &ChatMessage,
    limit: usize,
) -> Result<usize, ProtocolError> {
    if limit == 0 {
        return Err(ProtocolError::InvalidParcelLimit);
    }

    let parcels = split_into_parcels(&message.text, limit);
    for parcel in &parcels {
        let record = serialize_record(message, parcel);
        write_frame(writer, record.as_bytes())?;
    }
    Ok(parcels.len())
}

/// Returns `true` for errors a blocked read reports when a timeout elapsed.
pub fn is_timeout_error(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Fills `buf` completely.  Returns `Ok(false)` if the stream hit EOF first.
fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<bool, ProtocolError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
