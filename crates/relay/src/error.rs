//! Error types for the direct client.
//!
//! A lost server is not an error: the run loop reports it as
//! [`crate::ClientExit::ServerClosed`]. Errors here stop the client before
//! or outside of normal operation.

use std::io;
use std::net::SocketAddr;

use relay_protocol::ParseError;
use thiserror::Error;

// ============================================================================
// Client Error Type
// ============================================================================

#[derive(Error, Debug)]
pub enum ClientError {
    /// Server address or port failed validation.
    #[error(transparent)]
    InvalidArgument(#[from] ParseError),

    /// The TCP connection could not be established.
    ///
    /// Usually the server is not running or the port is wrong.
    #[error("Failed to connect to server {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Reading local input failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Result Type Alias
// ============================================================================

pub type Result<T> = std::result::Result<T, ClientError>;

// ============================================================================
// Tests
// ============================================================================
