//! Protocol module: message model, record format, chunking and framing.

pub mod chunking;
pub mod codec;
pub mod messages;
pub mod record;

pub use chunking::split_into_parcels;
pub use codec::{is_timeout_error, read_frame, send_parcelled, write_frame, ProtocolError};
pub use messages::*;
pub use record::{decode_record, serialize_record};
