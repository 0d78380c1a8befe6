//! Acceptance path: ready listener → new connection.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Result of one accept attempt on a ready listener.
#[derive(Debug)]
pub enum Accepted {
    /// A new connection, already switched to blocking mode.
    Connection(TcpStream, SocketAddr),
    /// The readiness report was spurious; nothing was pending.
    WouldBlock,
}

/// Accepts one pending connection.
///
/// Interrupted calls are retried. The returned stream is blocking because
/// broadcast writes rely on it.
pub fn accept_connection(listener: &TcpListener) -> io::Result<Accepted> {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(false)?;
                return Ok(Accepted::Connection(stream, peer));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Accepted::WouldBlock),
            Err(e) => return Err(e),
        }
    }
}
