//! Operator input: the server's own command source.
//!
//! Any readable descriptor works (stdin in the binary, a socket pair in
//! tests). Bytes are split into lines; the event loop decides what each
//! line means.

use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};

use relay_protocol::LineAssembler;
use tracing::warn;

/// Bytes read from operator input per readiness event.
const OPERATOR_READ_SIZE: usize = 1024;

/// Lines produced by one read of operator input.
#[derive(Debug, PartialEq, Eq)]
pub enum OperatorRead {
    /// Complete lines; may be empty if the read ended mid-line.
    Lines(Vec<String>),
    /// Input reached EOF. Carries any final unterminated line.
    Closed(Vec<String>),
}

/// Line-buffered reader over the operator's input descriptor.
pub struct OperatorInput<I> {
    input: I,
    lines: LineAssembler,
    buf: [u8; OPERATOR_READ_SIZE],
}

impl<I: Read + AsRawFd> OperatorInput<I> {
    pub fn new(input: I) -> Self {
        Self {
            input,
            lines: LineAssembler::default(),
            buf: [0; OPERATOR_READ_SIZE],
        }
    }

    pub fn fd(&self) -> RawFd {
        self.input.as_raw_fd()
    }

    /// Reads what is available after a readiness report.
    ///
    /// A read error other than `Interrupted` or `WouldBlock` is logged and
    /// treated as end of input.
    pub fn read(&mut self) -> OperatorRead {
        let n = loop {
            match self.input.read(&mut self.buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return OperatorRead::Lines(Vec::new())
                }
                Err(e) => {
                    warn!(error = %e, "Operator input failed");
                    break 0;
                }
            }
        };

        if n == 0 {
            return OperatorRead::Closed(self.lines.take_pending().into_iter().collect());
        }

        let feed = self.lines.push(self.buf.get(..n).unwrap_or_default());
        if feed.discarded > 0 {
            warn!(bytes = feed.discarded, "Discarded overlong operator line");
        }
        OperatorRead::Lines(feed.lines)
    }
}
