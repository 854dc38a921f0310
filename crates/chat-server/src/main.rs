//! parcel-chat server entry point.
//!
//! Loads the configuration, binds the listener and relays chat messages
//! until SIGINT or SIGTERM.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config() + CLI overrides
//!  └─ ChatServer::bind()
//!       ├─ broadcaster thread   (mailbox → every client)
//!       ├─ accept loop          (blocking pool thread, one handler thread per client)
//!       └─ signal task          (clears the running flag, nothing else)
//!  └─ ChatServer::shutdown()
//! ```
//!
//! # Usage
//!
//! ```text
//! chat-server [--config <PATH>] [--port <PORT>] [--bind <IP>] [--max-clients <N>]
//! ```
//!
//! `--port`, `--bind` and `--max-clients` can also be set through
//! `CHAT_PORT`, `CHAT_BIND` and `CHAT_MAX_CLIENTS`.  The log level comes from
//! `RUST_LOG`, falling back to `server.log_level` in the config file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chat_server::{load_config, ChatServer, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Multi-client TCP chat relay.
#[derive(Debug, Parser)]
#[command(name = "chat-server", about = "Relays chat messages between up to ten TCP clients", version)]
struct Cli {
    /// Path to a TOML config file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// TCP port to listen on.
    #[arg(long, env = "CHAT_PORT")]
    port: Option<u16>,

    /// Address to bind; `0.0.0.0` listens on every interface.
    #[arg(long, env = "CHAT_BIND")]
    bind: Option<String>,

    /// Maximum number of simultaneously connected clients.
    #[arg(long, env = "CHAT_MAX_CLIENTS")]
    max_clients: Option<usize>,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if an
    /// override is out of range.
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = load_config(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("failed to load config from {}", path.display()),
            None => "failed to load default config".to_string(),
        })?;

        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(max_clients) = self.max_clients {
            config.limits.max_clients = max_clients;
        }
        config.validate().context("invalid command-line override")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!("parcel-chat server starting");

    let mut server = ChatServer::bind(&config)?;
    server.start_broadcaster()?;

    let context = server.context();
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("shutdown signal received");
        context.stop();
    });

    // The accept loop and shutdown both block, so keep them off the runtime thread.
    let (mut server, result) = tokio::task::spawn_blocking(move || {
        let result = server.run();
        (server, result)
    })
    .await
    .context("accept loop panicked")?;

    let report = tokio::task::spawn_blocking(move || server.shutdown())
        .await
        .context("shutdown panicked")?;
    info!(
        "parcel-chat server stopped ({} handler(s) joined, {} message(s) discarded)",
        report.handlers_joined, report.messages_discarded
    );

    result.map_err(Into::into)
}

/// Resolves on SIGINT, or on SIGTERM where the platform has it.
async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!("failed to listen for Ctrl+C: {e}");
                        }
                    }
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!("SIGTERM handler unavailable: {e}"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {e}");
        // Without a signal source the server runs until killed.
        std::future::pending::<()>().await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
