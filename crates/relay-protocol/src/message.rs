//! Labelled relay messages.
//!
//! A chunk read from a peer is relayed as `[ip:port]: <chunk>`. The bytes
//! that go on the wire always carry the whole chunk; only the console label
//! is truncated to the configured display limit.

use std::net::SocketAddr;

/// Exact operator input that ends the server and client loops.
pub const SENTINEL: &str = "exit()";

/// Tag used for lines typed by the server operator.
pub const SERVER_TAG: &str = "SERVER";

/// Payload bytes shown in a console label before truncation.
pub const DEFAULT_DISPLAY_LIMIT: usize = 100;

/// A message ready to be broadcast and shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relayed {
    /// Bytes written to every recipient.
    pub wire: Vec<u8>,
    /// Text pushed into the console history.
    pub display: String,
}

impl Relayed {
    /// Labels a chunk received from `peer`.
    ///
    /// `display_limit` caps the payload bytes in [`Relayed::display`];
    /// [`Relayed::wire`] always contains the full chunk.
    pub fn from_peer(peer: &SocketAddr, chunk: &[u8], display_limit: usize) -> Self {
        let prefix = peer_prefix(peer);

        let mut wire = Vec::with_capacity(prefix.len() + chunk.len());
        wire.extend_from_slice(prefix.as_bytes());
        wire.extend_from_slice(chunk);

        let shown = chunk.get(..display_limit).unwrap_or(chunk);
        let display = format!("{prefix}{}", String::from_utf8_lossy(shown));

        Self { wire, display }
    }

    /// Labels a line typed by the server operator.
    ///
    /// The wire form always ends with exactly one newline; the display form
    /// is the line as typed.
    pub fn from_operator(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n'].as_slice());
        Self {
            wire: format!("[{SERVER_TAG}]: {line}\n").into_bytes(),
            display: line.to_string(),
        }
    }
}

/// Returns the `[ip:port]: ` prefix for a peer.
pub fn peer_prefix(peer: &SocketAddr) -> String {
    format!("[{}:{}]: ", peer.ip(), peer.port())
}

/// Returns true if `line` (with or without its line ending) is the sentinel.
pub fn is_sentinel(line: &str) -> bool {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
        == SENTINEL
}

/// Console notice for a newly accepted peer.
pub fn connected_notice(peer: &SocketAddr) -> String {
    format!("Client connected: {}:{}", peer.ip(), peer.port())
}

/// Console notice for a peer that went away.
pub fn disconnected_notice(peer: &SocketAddr) -> String {
    format!("Client {}:{} disconnected", peer.ip(), peer.port())
}
