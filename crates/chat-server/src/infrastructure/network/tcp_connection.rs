//! `PeerConnection` over a TCP stream.

use std::net::{Shutdown, SocketAddr, TcpStream};

use chat_core::{write_frame, ProtocolError};
use tracing::debug;

use crate::application::manage_clients::PeerConnection;

/// Write half of an accepted client socket, as stored in the registry.
///
/// The connection handler reads from its own clone of the same socket, so
/// `shutdown_read` and `close` here are seen by that reader too.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }
}

impl PeerConnection for TcpConnection {
    fn send_frame(&self, payload: &[u8]) -> Result<(), ProtocolError> {
        // `&TcpStream` implements `Write`, so concurrent holders need no `&mut`.
        write_frame(&mut &self.stream, payload)
    }

    fn shutdown_read(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Read) {
            debug!("half-close of {} failed: {e}", self.peer);
        }
    }

    fn close(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("close of {} failed: {e}", self.peer);
        }
    }
}
