//! A single accepted client connection.

use std::net::{SocketAddr, TcpStream};

use chrono::{DateTime, Utc};

/// One accepted client socket plus its metadata.
///
/// The connection is the only owner of its socket: dropping it closes the
/// descriptor, so a connection can only ever be closed once.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    connected_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            connected_at: Utc::now(),
        }
    }

    /// Remote address captured at accept time.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// The underlying socket. `&TcpStream` implements both `Read` and
    /// `Write`, so shared access is enough for I/O.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Time since the connection was accepted.
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.connected_at)
    }
}
