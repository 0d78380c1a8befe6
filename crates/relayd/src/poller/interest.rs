//! Interest set with an incrementally maintained maximum descriptor.

use std::collections::HashMap;
use std::os::unix::io::RawFd;

use super::Interest;

/// Registered descriptors and the largest of them.
///
/// The maximum is raised on insert and only rescanned when the current
/// maximum itself is removed.
#[derive(Debug, Default)]
pub struct InterestSet {
    entries: HashMap<RawFd, Interest>,
    max: Option<RawFd>,
}

impl InterestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `fd`. Returns true if it was not present before.
    pub fn insert(&mut self, fd: RawFd, interest: Interest) -> bool {
        let added = self.entries.insert(fd, interest).is_none();
        if self.max.map_or(true, |max| fd > max) {
            self.max = Some(fd);
        }
        added
    }

    /// Removes `fd`, returning its interest if it was present.
    pub fn remove(&mut self, fd: RawFd) -> Option<Interest> {
        let removed = self.entries.remove(&fd)?;
        if self.max == Some(fd) {
            self.max = self.entries.keys().copied().max();
        }
        Some(removed)
    }

    pub fn get(&self, fd: RawFd) -> Option<Interest> {
        self.entries.get(&fd).copied()
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        self.entries.contains_key(&fd)
    }

    /// Largest registered descriptor, `None` when empty.
    pub fn max(&self) -> Option<RawFd> {
        self.max
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered descriptors with their interest, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (RawFd, Interest)> + '_ {
        self.entries.iter().map(|(&fd, &interest)| (fd, interest))
    }
}
