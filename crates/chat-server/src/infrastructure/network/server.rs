//! TCP front door of the chat server.
//!
//! [`ChatServer`] binds the listening socket, starts the broadcaster, and
//! runs the accept loop on the calling thread.  Each accepted connection is
//! registered and handed to a named handler thread.  When the registry is
//! full, the new connection is closed straight away and gets no handler.
//!
//! # Accept loop polling
//!
//! The listener is non-blocking.  When no connection is pending the loop
//! sleeps for [`ACCEPT_POLL_INTERVAL`] and re-checks the running flag, so a
//! termination signal is noticed within that interval.
//!
//! The listening socket is built with `socket2` so the configured backlog
//! reaches `listen(2)`; `std::net::TcpListener::bind` always uses its own.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use chat_core::protocol::is_timeout_error;
use chat_core::ConnectionId;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::broadcast::Broadcaster;
use crate::application::context::ServerContext;
use crate::application::handle_connection::ConnectionHandler;
use crate::application::manage_clients::{PeerConnection, RegistryError};
use crate::infrastructure::storage::config::ServerConfig;

use super::shutdown::{ShutdownCoordinator, ShutdownReport};
use super::tcp_connection::TcpConnection;

/// Sleep between accept attempts while no connection is pending.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Error type for server lifecycle operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be set up.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// A server thread could not be started.
    #[error("failed to spawn {what} thread: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },
    /// The listening socket failed while accepting.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
    /// The new connection was not registered.
    #[error(transparent)]
    Rejected(#[from] RegistryError),
    /// The accepted socket could not be prepared.
    #[error("failed to set up connection from {peer}: {source}")]
    Setup {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// A bound chat relay.
pub struct ChatServer {
    context: Arc<ServerContext<TcpConnection>>,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    shutdown: ShutdownCoordinator,
}

impl ChatServer {
    /// Binds the listening socket described by `config`, with
    /// `network.backlog` as the pending-connection queue length.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address does not resolve, cannot
    /// be bound, or the socket cannot be made non-blocking.
    pub fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let host = config.network.bind_address.as_str();
        let port = config.network.port;
        let bind_err = |source| ServerError::Bind {
            addr: format!("{host}:{port}"),
            source,
        };

        let listener = (host, port)
            .to_socket_addrs()
            .and_then(|addrs| listen_on_first(addrs, config.network.backlog))
            .map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let context = Arc::new(ServerContext::new(config.limits.max_clients));
        info!(
            "listening on {local_addr} (max {} clients, backlog {})",
            config.limits.max_clients, config.network.backlog
        );
        Ok(Self {
            shutdown: ShutdownCoordinator::new(Arc::clone(&context)),
            context,
            listener: Some(listener),
            local_addr,
        })
    }

    /// Address the listener is bound to (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared state, e.g. for a signal task to clear the running flag.
    pub fn context(&self) -> Arc<ServerContext<TcpConnection>> {
        Arc::clone(&self.context)
    }

    /// Starts the broadcaster thread.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Spawn`] if the thread cannot be created.
    pub fn start_broadcaster(&mut self) -> Result<(), ServerError> {
        let handle = Broadcaster::spawn(Arc::clone(&self.context))
            .map_err(|source| ServerError::Spawn { what: "broadcaster", source })?;
        self.shutdown.set_broadcaster(handle);
        Ok(())
    }

    /// Accepts connections until the running flag is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] if the listening socket fails.
    /// Problems with a single accepted connection are logged and skipped.
    pub fn run(&mut self) -> Result<(), ServerError> {
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };
        let result = self.accept_loop(&listener);
        self.listener = Some(listener);
        result
    }

    fn accept_loop(&mut self, listener: &TcpListener) -> Result<(), ServerError> {
        while self.context.is_running() {
            match listener.accept() {
                Ok((stream, peer)) => match self.on_accepted(stream, peer) {
                    Ok(id) => debug!("{id} accepted from {peer}"),
                    Err(e) => warn!("connection from {peer} dropped: {e}"),
                },
                Err(e) if is_timeout_error(&e) => {
                    self.shutdown.reap_finished_handlers();
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!("accept failed: {e}");
                    return Err(ServerError::Accept(e));
                }
            }
        }
        info!("accept loop stopped");
        Ok(())
    }

    /// Registers a freshly accepted connection and starts its handler.
    ///
    /// When every slot is taken the stream is closed and no handler is
    /// started.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Rejected`] for a full registry,
    /// [`ServerError::Setup`] if the socket cannot be cloned or switched to
    /// blocking mode, and [`ServerError::Spawn`] if the handler thread
    /// cannot be started.  The connection is closed in every error case.
    pub fn on_accepted(&mut self, stream: TcpStream, peer: SocketAddr) -> Result<ConnectionId, ServerError> {
        let setup = |source| ServerError::Setup { peer, source };
        // Some platforms hand out sockets that inherit the listener's mode.
        stream.set_nonblocking(false).map_err(setup)?;
        let writer = stream.try_clone().map_err(setup)?;

        let id = self.context.next_connection_id();
        if let Err(e) = self.context.registry().add(id, TcpConnection::new(writer, peer)) {
            warn!("rejecting {peer}: {e}");
            let _ = stream.shutdown(Shutdown::Both);
            return Err(e.into());
        }

        let context = Arc::clone(&self.context);
        let spawned = std::thread::Builder::new()
            .name(format!("chat-{id}"))
            .spawn(move || {
                let mut handler = ConnectionHandler::new(id, stream, context);
                let exit = handler.run();
                debug!("{} handler thread exiting ({exit:?})", handler.id());
                exit
            });

        match spawned {
            Ok(thread) => {
                self.shutdown.track_handler(id, thread);
                info!(
                    "{id} connected from {peer}; {} client(s) connected",
                    self.context.active_clients()
                );
                Ok(id)
            }
            Err(source) => {
                if let Some(conn) = self.context.registry().remove(id) {
                    conn.close();
                }
                Err(ServerError::Spawn { what: "connection handler", source })
            }
        }
    }

    /// Runs the shutdown sequence.  Safe to call more than once.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let listener = self.listener.take();
        self.shutdown.run(listener)
    }
}

/// Tries each resolved address until one can be bound.
fn listen_on_first(addrs: impl Iterator<Item = SocketAddr>, backlog: u32) -> io::Result<TcpListener> {
    let mut last_err = None;
    for addr in addrs {
        match listen(addr, backlog) {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                debug!("bind to {addr} failed: {e}");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")))
}

/// Creates a non-blocking listener on `addr` with the given backlog.
fn listen(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

impl Drop for ChatServer {
    fn drop(&mut self) {
        if !self.shutdown.is_complete() {
            self.shutdown();
        }
    }
}
