//! Display server.
//!
//! Accepts one client at a time and shows every newline-delimited line it
//! sends as `[ip]: line`. The next client is accepted only after the
//! current one disconnects.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};

use relay_core::ConsoleSink;
use relay_protocol::{connected_notice, LineAssembler, DEFAULT_LINE_CAPACITY};
use tracing::{info, warn};

use crate::config::LISTEN_BACKLOG;
use crate::server::{create_listening_socket, ServerError};

pub struct DisplayServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl DisplayServer {
    /// Binds `0.0.0.0:port` with a blocking listener.
    pub fn bind(port: u16) -> Result<Self, ServerError> {
        let listener = create_listening_socket(port, LISTEN_BACKLOG)?;
        let local_addr = listener
            .set_nonblocking(false)
            .and_then(|()| listener.local_addr())
            .map_err(|source| ServerError::Listen { port, source })?;
        info!(addr = %local_addr, "Display server listening");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts one client and shows its lines until it disconnects.
    ///
    /// Returns the address of the client that was served.
    pub fn serve_one<C: ConsoleSink + ?Sized>(&self, sink: &mut C) -> io::Result<SocketAddr> {
        let (stream, peer) = loop {
            match self.listener.accept() {
                Ok(accepted) => break accepted,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        handle_client(stream, peer, sink);
        Ok(peer)
    }

    /// Serves clients one after another, forever.
    pub fn run<C: ConsoleSink + ?Sized>(&self, sink: &mut C) -> ! {
        loop {
            if let Err(e) = self.serve_one(sink) {
                warn!(error = %e, "Accept failed");
            }
        }
    }
}

/// Shows each complete line from `stream` until EOF or a read error.
fn handle_client<C: ConsoleSink + ?Sized>(mut stream: TcpStream, peer: SocketAddr, sink: &mut C) {
    let ip = peer.ip();
    show(sink, &connected_notice(&peer));

    let mut lines = LineAssembler::new(DEFAULT_LINE_CAPACITY);
    let mut buf = vec![0u8; DEFAULT_LINE_CAPACITY];

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => {
                show(sink, &format!("Client {ip} disconnected"));
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Read failed");
                break;
            }
        };

        let feed = lines.push(buf.get(..n).unwrap_or_default());
        for line in &feed.lines {
            show(sink, &format!("[{ip}]: {line}"));
        }
        if feed.discarded > 0 {
            warn!(peer = %peer, bytes = feed.discarded, "Buffer overflow, discarding data");
        }
    }
}

fn show<C: ConsoleSink + ?Sized>(sink: &mut C, message: &str) {
    if let Err(e) = sink.show(message) {
        warn!(error = %e, "Display update failed");
    }
}
