//! Newline assembly for line-oriented readers.
//!
//! Reads from a socket or pipe arrive in arbitrary fragments. The assembler
//! buffers the unterminated tail and hands back every complete line. A tail
//! that grows to the capacity without a newline is discarded.

/// Default buffered bytes before an unterminated line is discarded.
pub const DEFAULT_LINE_CAPACITY: usize = 8192;

/// Result of feeding one chunk into a [`LineAssembler`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Feed {
    /// Complete lines, without their `\n` (or `\r\n`).
    pub lines: Vec<String>,
    /// Bytes thrown away because the pending line overflowed.
    pub discarded: usize,
}

/// Accumulates bytes and splits them into lines.
#[derive(Debug)]
pub struct LineAssembler {
    pending: Vec<u8>,
    capacity: usize,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_CAPACITY)
    }
}

impl LineAssembler {
    /// Creates an assembler that holds at most `capacity - 1` pending bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Vec::new(),
            capacity: capacity.max(2),
        }
    }

    /// Feeds a chunk and returns the lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Feed {
        self.pending.extend_from_slice(chunk);

        let mut feed = Feed::default();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let rest = self.pending.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.pending, rest);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            feed.lines.push(String::from_utf8_lossy(&line).into_owned());
        }

        if self.pending.len() >= self.capacity - 1 {
            feed.discarded = self.pending.len();
            self.pending.clear();
        }

        feed
    }

    /// Bytes waiting for a newline.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Takes the unterminated tail, e.g. when the stream hits EOF.
    pub fn take_pending(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }
}
