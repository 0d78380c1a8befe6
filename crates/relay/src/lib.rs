//! Relay Client - Direct chat client for the relay server
//!
//! The client runs a single task that waits on two sources with
//! `tokio::select!`:
//!
//! 1. **Local input**: each line is sent to the server; `exit()` stops
//! 2. **Server socket**: each received chunk is shown in the console
//!
//! A shared `CancellationToken` lets the binary stop the loop on Ctrl-C.

pub mod client;
pub mod error;

// Re-export commonly used types
pub use client::{ClientConfig, ClientExit, RelayClient};
pub use error::{ClientError, Result};
