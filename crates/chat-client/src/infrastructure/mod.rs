//! Infrastructure layer for the chat client.
//!
//! - **`network`** – The TCP session with the server and its threads.
//! - **`console`** – stdin line source and stdout renderer.

pub mod console;
pub mod network;
