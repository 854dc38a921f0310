//! TOML configuration for the chat server.
//!
//! The file is optional.  When `--config` is not given the server looks in
//! the platform config directory:
//! - Windows:  `%APPDATA%\ParcelChat\server.toml`
//! - Linux:    `~/.config/parcel-chat/server.toml`
//! - macOS:    `~/Library/Application Support/ParcelChat/server.toml`
//!
//! A missing file means defaults.  Every field has a serde default, so a
//! file only needs the values it changes:
//!
//! ```toml
//! [network]
//! port = 9000
//!
//! [limits]
//! max_clients = 4
//! ```
//!
//! Command-line flags are applied on top of whatever was loaded (see
//! `main.rs`).

use std::path::{Path, PathBuf};

use chat_core::protocol::{DEFAULT_PORT, MAX_CLIENTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A loaded value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listening socket settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// `"0.0.0.0"` listens on every interface.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Pending-connection queue length passed to `listen(2)`.  The kernel
    /// may cap it (`net.core.somaxconn` on Linux).
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Connections served at once; further ones are closed on accept.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_backlog() -> u32 {
    5
}
fn default_max_clients() -> usize {
    MAX_CLIENTS
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            backlog: default_backlog(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
        }
    }
}

impl ServerConfig {
    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `max_clients` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_clients == 0 {
            return Err(ConfigError::Invalid("limits.max_clients must be at least 1".into()));
        }
        Ok(())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default path of the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("server.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the configuration from `path`, or from [`config_file_path`] when
/// `path` is `None`.
///
/// Returns `ServerConfig::default()` if the file does not exist, or if no
/// path was given and the platform has no config directory.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed and
/// [`ConfigError::Invalid`] for out-of-range values.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match config_file_path() {
            Ok(p) => p,
            Err(ConfigError::NoPlatformConfigDir) => return Ok(ServerConfig::default()),
            Err(e) => return Err(e),
        },
    };

    let cfg = match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str::<ServerConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ServerConfig::default(),
        Err(e) => return Err(ConfigError::Io { path, source: e }),
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ParcelChat"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("parcel-chat"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ParcelChat")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
