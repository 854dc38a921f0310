//! parcel-chat client entry point.
//!
//! Connects to a chat server, relays typed lines to it and prints every
//! message the server broadcasts.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ ChatSession::connect()   -- resolve + TCP connect (fatal on failure)
//!  └─ ChatSession::run()
//!       ├─ listener thread      (server → mailbox)
//!       ├─ sender thread        (stdin → server)
//!       └─ display loop         (mailbox → stdout)
//! ```
//!
//! # Usage
//!
//! ```text
//! chat-client --user <NAME> --server <NAME-OR-IP> [--port <PORT>]
//! ```
//!
//! Type `>>bye<<` (or close stdin) to leave.  Logs go to stderr so they do
//! not interleave with the chat on stdout; set `RUST_LOG=info` to see them.

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_client::infrastructure::console::{ConsoleRenderer, StdinLineSource};
use chat_client::{ChatSession, ClientConfig};
use chat_core::protocol::DEFAULT_PORT;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Terminal client for a parcel-chat server.
#[derive(Debug, Parser)]
#[command(name = "chat-client", about = "Chat with everyone connected to a parcel-chat server", version)]
struct Cli {
    /// Name shown next to your messages (first five characters are used).
    #[arg(long)]
    user: String,

    /// Server host name or IP address.
    #[arg(long)]
    server: String,

    /// Server TCP port.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "CHAT_PORT")]
    port: u16,
}

impl Cli {
    fn into_config(self) -> ClientConfig {
        ClientConfig {
            server: self.server,
            port: self.port,
            user: self.user,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = Cli::parse().into_config();
    let session = ChatSession::connect(&config)
        .with_context(|| format!("could not reach {}:{}", config.server, config.port))?;

    let terminate = session.terminate_flag();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupted; leaving the chat");
                terminate.store(true, std::sync::atomic::Ordering::SeqCst);
            }
            Err(e) => error!("failed to listen for Ctrl+C: {e}"),
        }
    });

    let summary = tokio::task::spawn_blocking(move || {
        let mut renderer = ConsoleRenderer::stdout();
        session.run(StdinLineSource::stdin(), &mut renderer)
    })
    .await
    .context("session panicked")??;

    info!("session ended: {summary:?}");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
