//! `select(2)` backend.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use super::{timeout_millis, Interest, InterestSet, Poller, Readiness};

/// Poller backed by `select(2)`.
///
/// `nfds` is the interest set's maximum descriptor plus one, so removing
/// the largest descriptor shrinks every subsequent scan.
#[derive(Debug, Default)]
pub struct SelectPoller {
    interest: InterestSet,
}

impl SelectPoller {
    pub fn new() -> Self {
        Self::default()
    }
}

fn empty_set() -> libc::fd_set {
    // SAFETY: fd_set is a plain bit array; all-zero is the empty set, and
    // FD_ZERO is applied on top for platforms that want it.
    let mut set: libc::fd_set = unsafe { std::mem::zeroed() };
    unsafe { libc::FD_ZERO(&mut set) };
    set
}

impl Poller for SelectPoller {
    fn register(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        if fd < 0 || fd as usize >= libc::FD_SETSIZE as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "descriptor {fd} outside select range 0..{}",
                    libc::FD_SETSIZE
                ),
            ));
        }
        self.interest.insert(fd, interest);
        Ok(())
    }

    fn unregister(&mut self, fd: RawFd) -> bool {
        self.interest.remove(fd).is_some()
    }

    fn wait(
        &mut self,
        events: &mut Vec<Readiness>,
        timeout: Option<Duration>,
    ) -> io::Result<usize> {
        let nfds = self.interest.max().map_or(0, |max| max + 1);
        let timeout_ms = timeout_millis(timeout);

        let (read_set, write_set) = loop {
            let mut read_set = empty_set();
            let mut write_set = empty_set();
            for (fd, interest) in self.interest.iter() {
                // SAFETY: `register` keeps every fd inside 0..FD_SETSIZE.
                unsafe {
                    if interest.is_readable() {
                        libc::FD_SET(fd, &mut read_set);
                    }
                    if interest.is_writable() {
                        libc::FD_SET(fd, &mut write_set);
                    }
                }
            }

            let mut tv = timeout_ms.map(|ms| libc::timeval {
                tv_sec: (ms / 1000) as libc::time_t,
                tv_usec: ((ms % 1000) * 1000) as libc::suseconds_t,
            });
            let tv_ptr = tv
                .as_mut()
                .map_or(std::ptr::null_mut(), |tv| tv as *mut libc::timeval);

            // SAFETY: both sets are initialised locals and `tv_ptr` is
            // either null or points at a local timeval.
            let rc = unsafe {
                libc::select(
                    nfds,
                    &mut read_set,
                    &mut write_set,
                    std::ptr::null_mut(),
                    tv_ptr,
                )
            };
            if rc >= 0 {
                break (read_set, write_set);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        };

        let before = events.len();
        for (fd, _) in self.interest.iter() {
            // SAFETY: fd is inside 0..FD_SETSIZE (see `register`).
            let (readable, writable) = unsafe {
                (
                    libc::FD_ISSET(fd, &read_set),
                    libc::FD_ISSET(fd, &write_set),
                )
            };
            if readable || writable {
                events.push(Readiness {
                    fd,
                    readable,
                    writable,
                    hangup: false,
                    error: false,
                });
            }
        }
        Ok(events.len() - before)
    }

    fn interest(&self) -> &InterestSet {
        &self.interest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_descriptor_beyond_fd_setsize() {
        let mut poller = SelectPoller::new();
        let too_big = libc::FD_SETSIZE as RawFd;
        let err = poller.register(too_big, Interest::READABLE).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(poller.interest().is_empty());
    }

    #[test]
    fn test_rejects_negative_descriptor() {
        let mut poller = SelectPoller::new();
        assert!(poller.register(-1, Interest::READABLE).is_err());
    }

    #[test]
    fn test_max_descriptor_follows_interest() {
        let mut poller = SelectPoller::new();
        poller.register(3, Interest::READABLE).unwrap();
        poller.register(8, Interest::READABLE).unwrap();
        assert_eq!(poller.max_descriptor(), Some(8));
        poller.unregister(8);
        assert_eq!(poller.max_descriptor(), Some(3));
    }
}
