//! Integration tests for the relay over real loopback TCP.
//!
//! Each test starts a `ChatServer` on `127.0.0.1:0`, runs its accept loop on
//! a background thread, and talks to it with plain `TcpStream` clients that
//! use the chat-core codec exactly as `chat-client` does.
//!
//! They verify:
//!
//! - Fan-out: a long line is split into parcels and every parcel reaches
//!   every client, the sender included.
//! - The `>>bye<<` sentinel deregisters its sender and is not relayed.
//! - A connection beyond the client limit is closed without service.
//! - Shutdown completes both when idle and with clients connected.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chat_core::protocol::{
    decode_record, read_frame, send_parcelled, ChatMessage, DISCONNECT_SENTINEL, MAX_PARCEL_LEN,
};
use chat_server::application::context::ServerContext;
use chat_server::infrastructure::network::tcp_connection::TcpConnection;
use chat_server::{ChatServer, ServerConfig, ShutdownReport};

// ── Harness ───────────────────────────────────────────────────────────────────

struct RunningServer {
    addr: SocketAddr,
    context: Arc<ServerContext<TcpConnection>>,
    accept_thread: JoinHandle<ChatServer>,
}

impl RunningServer {
    fn start(max_clients: usize) -> Self {
        let mut config = ServerConfig::default();
        config.network.bind_address = "127.0.0.1".to_string();
        config.network.port = 0;
        config.limits.max_clients = max_clients;

        let mut server = ChatServer::bind(&config).expect("bind");
        server.start_broadcaster().expect("broadcaster");
        let addr = server.local_addr();
        let context = server.context();
        let accept_thread = thread::spawn(move || {
            server.run().expect("accept loop");
            server
        });
        Self {
            addr,
            context,
            accept_thread,
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout");
        stream
    }

    fn wait_for_clients(&self, expected: usize) {
        wait_until(|| self.context.active_clients() == expected);
    }

    fn stop(self) -> ShutdownReport {
        self.context.stop();
        let mut server = self.accept_thread.join().expect("accept thread");
        server.shutdown()
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached within 5s");
        thread::sleep(Duration::from_millis(10));
    }
}

fn say(stream: &mut TcpStream, user: &str, text: &str) -> usize {
    let message = ChatMessage::new("127.0.0.1", user, text);
    send_parcelled(stream, &message, MAX_PARCEL_LEN).expect("send")
}

fn hear(stream: &mut TcpStream) -> ChatMessage {
    let payload = read_frame(stream)
        .expect("read")
        .expect("server closed the connection");
    decode_record(&String::from_utf8_lossy(&payload))
}

// ── Relay tests ───────────────────────────────────────────────────────────────

#[test]
fn test_long_line_reaches_every_client_as_three_parcels() {
    // Arrange
    let server = RunningServer::start(10);
    let mut alice = server.connect();
    let mut bob = server.connect();
    server.wait_for_clients(2);
    let text = format!("{}{}", "aaaaaaaaa ".repeat(8), "i".repeat(10));
    assert_eq!(text.len(), 90);

    // Act
    let sent = say(&mut alice, "alice", &text);

    // Assert
    assert_eq!(sent, 3);
    for client in [&mut alice, &mut bob] {
        let parcels: Vec<ChatMessage> = (0..3).map(|_| hear(client)).collect();
        assert!(parcels.iter().all(|m| m.user_name == "alice"));
        assert!(parcels.iter().all(|m| m.text.chars().count() <= MAX_PARCEL_LEN));
        let texts: Vec<&str> = parcels.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts.join(" "), text);
    }

    server.stop();
}

#[test]
fn test_user_name_is_truncated_on_the_wire() {
    let server = RunningServer::start(10);
    let mut client = server.connect();
    server.wait_for_clients(1);

    say(&mut client, "bartholomew", "hi");

    assert_eq!(hear(&mut client).user_name, "barth");
    server.stop();
}

#[test]
fn test_sentinel_deregisters_without_broadcast() {
    // Arrange
    let server = RunningServer::start(10);
    let mut leaver = server.connect();
    let mut stayer = server.connect();
    server.wait_for_clients(2);

    // Act
    say(&mut leaver, "leo", DISCONNECT_SENTINEL);
    server.wait_for_clients(1);
    say(&mut stayer, "sam", "anyone here?");

    // Assert: the first thing the remaining client hears is its own message
    assert_eq!(hear(&mut stayer).text, "anyone here?");
    assert!(read_frame(&mut leaver).expect("orderly close").is_none());

    server.stop();
}

#[test]
fn test_peer_close_frees_the_slot() {
    let server = RunningServer::start(1);
    let first = server.connect();
    server.wait_for_clients(1);

    drop(first);
    server.wait_for_clients(0);
    let _second = server.connect();

    server.wait_for_clients(1);
    server.stop();
}

#[test]
fn test_connection_beyond_limit_is_closed() {
    // Arrange
    let server = RunningServer::start(10);
    let clients: Vec<TcpStream> = (0..10).map(|_| server.connect()).collect();
    server.wait_for_clients(10);

    // Act
    let mut eleventh = server.connect();

    // Assert
    assert!(matches!(read_frame(&mut eleventh), Ok(None)));
    assert_eq!(server.context.active_clients(), 10);

    drop(clients);
    server.stop();
}

// ── Shutdown tests ────────────────────────────────────────────────────────────

#[test]
fn test_idle_shutdown_completes() {
    let server = RunningServer::start(10);

    let report = server.stop();

    assert_eq!(report.handlers_joined, 0);
    assert_eq!(report.messages_discarded, 0);
    assert!(report.listener_closed);
}

#[test]
fn test_shutdown_disconnects_connected_clients() {
    // Arrange
    let server = RunningServer::start(10);
    let mut a = server.connect();
    let mut b = server.connect();
    server.wait_for_clients(2);

    // Act
    let report = server.stop();

    // Assert
    assert_eq!(report.handlers_joined, 2);
    assert!(read_frame(&mut a).expect("orderly close").is_none());
    assert!(read_frame(&mut b).expect("orderly close").is_none());
}
