//! Broadcast engine.
//!
//! Writes one message in full to every selected connection. Writes are
//! blocking: a recipient that stops reading stalls the fan-out until its
//! socket drains. Per-recipient outcomes:
//!
//! | write result                                   | action            |
//! |------------------------------------------------|-------------------|
//! | all bytes written                              | delivered         |
//! | `Ok(0)`                                        | detach            |
//! | `BrokenPipe`, `ConnectionReset`, `ConnectionAborted` | detach      |
//! | `Interrupted`                                  | retry same write  |
//! | anything else                                  | log, keep client  |
//!
//! There is no rollback: a failure on one recipient does not affect the
//! others, and a detached recipient is simply absent for the rest of the
//! pass.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::os::unix::io::RawFd;

use tracing::{debug, warn};

use crate::registry::Registry;

/// Which registered connections receive a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// Every registered connection.
    All,
    /// Every registered connection except this descriptor.
    AllExcept(RawFd),
}

impl Recipients {
    fn includes(self, fd: RawFd) -> bool {
        match self {
            Recipients::All => true,
            Recipients::AllExcept(skip) => fd != skip,
        }
    }
}

/// Outcome of one broadcast pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients that received the whole message.
    pub delivered: usize,
    /// Peers removed because their connection was gone.
    pub detached: Vec<SocketAddr>,
    /// Recipients skipped after a non-fatal write error.
    pub failed: usize,
}

/// Result of writing a whole message to one recipient.
#[derive(Debug)]
pub enum WriteOutcome {
    Delivered,
    PeerGone,
    Failed(io::Error),
}

/// Returns true for write errors that mean the peer is gone for good.
pub fn is_peer_gone(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}

/// Writes `message` in full, accumulating partial writes.
pub fn write_full<W: Write>(mut writer: W, message: &[u8]) -> WriteOutcome {
    let mut sent = 0;
    while sent < message.len() {
        let remaining = message.get(sent..).unwrap_or_default();
        match writer.write(remaining) {
            Ok(0) => return WriteOutcome::PeerGone,
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_peer_gone(&e) => return WriteOutcome::PeerGone,
            Err(e) => return WriteOutcome::Failed(e),
        }
    }
    WriteOutcome::Delivered
}

/// Sends `message` to every selected connection in registry order.
pub fn broadcast(registry: &mut Registry, message: &[u8], recipients: Recipients) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for fd in registry.descriptors() {
        if !recipients.includes(fd) {
            continue;
        }

        let (outcome, peer) = match registry.get(fd) {
            Some(conn) => (write_full(conn.stream(), message), conn.peer()),
            None => continue,
        };

        match outcome {
            WriteOutcome::Delivered => report.delivered += 1,
            WriteOutcome::PeerGone => {
                debug!(fd, peer = %peer, "Peer gone during broadcast");
                if let Some(peer) = registry.detach(fd) {
                    report.detached.push(peer);
                }
            }
            WriteOutcome::Failed(e) => {
                warn!(fd, peer = %peer, error = %e, "Broadcast write failed");
                report.failed += 1;
            }
        }
    }

    report
}

// ============================================================================
// Tests
// ============================================================================
