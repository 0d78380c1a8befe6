//! Readiness multiplexer.
//!
//! The event loop never calls `poll(2)` or `select(2)` directly. It talks to
//! a [`Poller`], which owns the interest set and reports which descriptors
//! are ready. Two backends are provided:
//!
//! - [`PollPoller`] - `poll(2)`, no descriptor ceiling (default)
//! - [`SelectPoller`] - `select(2)`, uses the tracked maximum descriptor as
//!   `nfds` and refuses descriptors at or above `FD_SETSIZE`
//!
//! Both retry a wait that was interrupted by a signal; any other failure is
//! returned to the caller.

mod interest;
mod poll;
mod select;

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use serde::Deserialize;

pub use interest::InterestSet;
pub use poll::PollPoller;
pub use select::SelectPoller;

// ============================================================================
// Interest / Readiness
// ============================================================================

/// What a registered descriptor is watched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    readable: bool,
    writable: bool,
}

impl Interest {
    /// Watch for incoming data, connections, or hang-up.
    pub const READABLE: Interest = Interest {
        readable: true,
        writable: false,
    };

    /// Watch for space in the send buffer.
    ///
    /// The relay loop itself registers read interest only; broadcast writes
    /// block instead. Both backends still honour write interest so a caller
    /// driving non-blocking writes can wait on it through the same trait.
    pub const WRITABLE: Interest = Interest {
        readable: false,
        writable: true,
    };

    /// Union of two interests.
    pub const fn add(self, other: Interest) -> Interest {
        Interest {
            readable: self.readable || other.readable,
            writable: self.writable || other.writable,
        }
    }

    pub const fn is_readable(self) -> bool {
        self.readable
    }

    pub const fn is_writable(self) -> bool {
        self.writable
    }
}

/// One ready descriptor reported by [`Poller::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub fd: RawFd,
    pub readable: bool,
    pub writable: bool,
    pub hangup: bool,
    pub error: bool,
}

impl Readiness {
    /// Returns true if a read on this descriptor will not block.
    ///
    /// Hang-up and error conditions count: the read is what reports them.
    pub fn is_read_ready(&self) -> bool {
        self.readable || self.hangup || self.error
    }
}

// ============================================================================
// Poller Trait
// ============================================================================

/// Readiness multiplexer over a settable set of descriptors.
pub trait Poller {
    /// Adds `fd` to the interest set, or replaces its interest.
    fn register(&mut self, fd: RawFd, interest: Interest) -> io::Result<()>;

    /// Removes `fd`. Returns false if it was not registered.
    fn unregister(&mut self, fd: RawFd) -> bool;

    /// Blocks until at least one descriptor is ready or `timeout` elapses
    /// (`None` waits indefinitely). Ready descriptors are appended to
    /// `events`; returns how many were appended.
    fn wait(&mut self, events: &mut Vec<Readiness>, timeout: Option<Duration>)
        -> io::Result<usize>;

    /// Current interest set.
    fn interest(&self) -> &InterestSet;

    /// Largest registered descriptor.
    fn max_descriptor(&self) -> Option<RawFd> {
        self.interest().max()
    }
}

// ============================================================================
// Backend Selection
// ============================================================================

/// Which readiness primitive the server uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// `poll(2)`
    #[default]
    Poll,
    /// `select(2)`
    Select,
}

impl Backend {
    /// Creates an empty poller of this kind.
    pub fn create(self) -> Box<dyn Poller> {
        match self {
            Backend::Poll => Box::new(PollPoller::new()),
            Backend::Select => Box::new(SelectPoller::new()),
        }
    }
}

/// Converts an optional timeout to whole milliseconds, rounding up so a
/// sub-millisecond timeout still waits.
pub(crate) fn timeout_millis(timeout: Option<Duration>) -> Option<i64> {
    timeout.map(|t| {
        let ms = t.as_millis();
        let ms = if t.subsec_nanos() % 1_000_000 != 0 { ms + 1 } else { ms };
        ms.min(i32::MAX as u128) as i64
    })
}

// ============================================================================
// Tests
// ============================================================================
