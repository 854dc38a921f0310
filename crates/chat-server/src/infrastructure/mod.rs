//! Infrastructure layer for the chat server.
//!
//! Contains OS-facing adapters: TCP sockets, server threads and the
//! configuration file.
//!
//! **Dependency rule**: this layer may depend on `application` and `chat_core`,
//! but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
