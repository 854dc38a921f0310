//! Network infrastructure for the chat client.
//!
//! [`ChatSession`] owns the TCP connection to the server and the threads
//! that use it:
//!
//! - the **listener** thread reads frames into the local mailbox;
//! - the **sender** thread reads user lines and writes parcels;
//! - the caller's thread runs the display loop.
//!
//! All three share one terminate flag.  The session ends when any of them
//! sets it: the user typed `>>bye<<`, input ended, the server went away, or
//! the process received Ctrl-C.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use chat_core::protocol::DEFAULT_PORT;
use chat_core::Mailbox;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::display::{run_display, MessageSink};
use crate::application::receive_messages::{run_listener, ListenerExit};
use crate::application::send_messages::{run_sender, LineSource, SenderExit, SenderIdentity};

/// Errors that can occur while setting up or running a session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server name did not resolve to any address.
    #[error("no address found for server {server}")]
    Resolve {
        server: String,
        #[source]
        source: Option<io::Error>,
    },
    /// No resolved address accepted the connection.
    #[error("failed to connect to {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: io::Error,
    },
    /// A session thread could not be started.
    #[error("failed to spawn {what} thread: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Settings for one chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server host name or IP address.
    pub server: String,
    pub port: u16,
    /// Display name; only the first five characters go on the wire.
    pub user: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            user: "guest".to_string(),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub messages_displayed: usize,
    pub listener: Option<ListenerExit>,
    /// `None` when the sender was still blocked on input and was left behind.
    pub sender: Option<SenderExit>,
}

/// A connected chat client.
pub struct ChatSession {
    stream: TcpStream,
    server_addr: SocketAddr,
    identity: SenderIdentity,
    mailbox: Arc<Mailbox>,
    terminate: Arc<AtomicBool>,
}

impl ChatSession {
    /// Resolves the server and connects to it.
    ///
    /// Every resolved address is tried in order until one accepts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Resolve`] if the name does not resolve and
    /// [`ClientError::Connect`] if no address accepts the connection.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let addrs: Vec<SocketAddr> = (config.server.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|source| ClientError::Resolve {
                server: config.server.clone(),
                source: Some(source),
            })?
            .collect();
        if addrs.is_empty() {
            return Err(ClientError::Resolve {
                server: config.server.clone(),
                source: None,
            });
        }

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect(addr) {
                Ok(stream) => return Self::from_stream(stream, &config.user),
                Err(e) => {
                    debug!("connect to {addr} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(ClientError::Connect {
            server: config.server.clone(),
            source: last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address")),
        })
    }

    /// Wraps an already connected stream.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the socket addresses cannot be read.
    pub fn from_stream(stream: TcpStream, user: &str) -> Result<Self, ClientError> {
        let server_addr = stream.peer_addr()?;
        let local_ip = stream.local_addr()?.ip().to_string();
        info!("connected to {server_addr} as {user} from {local_ip}");
        Ok(Self {
            stream,
            server_addr,
            identity: SenderIdentity {
                local_ip,
                user_name: user.to_string(),
            },
            mailbox: Arc::new(Mailbox::new()),
            terminate: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The address this client's messages are tagged with.
    pub fn local_ip(&self) -> &str {
        &self.identity.local_ip
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Shared flag that ends the session when set, e.g. from a signal handler.
    pub fn terminate_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminate)
    }

    /// Runs the session until it ends, showing messages on `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the connection cannot be shared with
    /// the worker threads, or [`ClientError::Spawn`] if a thread cannot be
    /// started.
    pub fn run<L, S>(self, source: L, sink: &mut S) -> Result<SessionSummary, ClientError>
    where
        L: LineSource + 'static,
        S: MessageSink + ?Sized,
    {
        let mut reader = self.stream.try_clone()?;
        let mut writer = self.stream.try_clone()?;

        let listener = {
            let mailbox = Arc::clone(&self.mailbox);
            let terminate = Arc::clone(&self.terminate);
            spawn("listener", move || run_listener(&mut reader, &mailbox, &terminate))?
        };

        let sender = {
            let identity = self.identity.clone();
            let terminate = Arc::clone(&self.terminate);
            let mut source = source;
            match spawn("sender", move || run_sender(&mut source, &mut writer, &identity, &terminate)) {
                Ok(sender) => sender,
                Err(e) => {
                    self.stop(listener);
                    return Err(e);
                }
            }
        };

        let messages_displayed = run_display(&self.mailbox, sink, self.local_ip(), &self.terminate);

        let listener_exit = self.stop(listener);
        // A sender blocked reading the terminal cannot be woken; leave it behind.
        let sender_exit = if sender.is_finished() {
            sender.join().ok()
        } else {
            debug!("sender still waiting for input; not joining it");
            None
        };

        Ok(SessionSummary {
            messages_displayed,
            listener: listener_exit,
            sender: sender_exit,
        })
    }

    /// Sets the terminate flag, closes the socket, joins the listener and
    /// releases the mailbox.
    fn stop(&self, listener: JoinHandle<ListenerExit>) -> Option<ListenerExit> {
        self.terminate.store(true, Ordering::SeqCst);
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("socket shutdown: {e}");
        }
        let exit = listener.join().ok();
        if exit.is_none() {
            warn!("listener thread panicked");
        }
        let discarded = self.mailbox.drain_and_release();
        if discarded > 0 {
            debug!("discarded {discarded} undisplayed message(s)");
        }
        info!("disconnected from {}", self.server_addr);
        exit
    }
}

fn spawn<T, F>(what: &'static str, f: F) -> Result<JoinHandle<T>, ClientError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("chat-{what}"))
        .spawn(f)
        .map_err(|source| ClientError::Spawn { what, source })
}
