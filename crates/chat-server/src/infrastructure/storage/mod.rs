//! Storage infrastructure: the optional TOML configuration file.
//!
//! The `config` sub-module reads the server's settings from disk and
//! supplies defaults when the file does not exist.

pub mod config;
