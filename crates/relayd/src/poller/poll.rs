//! `poll(2)` backend.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT};

use super::{timeout_millis, Interest, InterestSet, Poller, Readiness};

/// Poller backed by `poll(2)`.
///
/// The `pollfd` array is rebuilt from the interest set on every wait.
#[derive(Default)]
pub struct PollPoller {
    interest: InterestSet,
    fds: Vec<libc::pollfd>,
}

impl PollPoller {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Poller for PollPoller {
    fn register(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        if fd < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid descriptor {fd}"),
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
        self.fds.clear();
        for (fd, interest) in self.interest.iter() {
            let mut wanted = 0;
            if interest.is_readable() {
                wanted |= POLLIN;
            }
            if interest.is_writable() {
                wanted |= POLLOUT;
            }
            self.fds.push(libc::pollfd {
                fd,
                events: wanted,
                revents: 0,
            });
        }

        let timeout_ms = timeout_millis(timeout).map_or(-1, |ms| ms as libc::c_int);

        loop {
            // SAFETY: `fds` is a live, exclusively borrowed buffer of
            // `fds.len()` initialised `pollfd` entries.
            let rc = unsafe {
                libc::poll(
                    self.fds.as_mut_ptr(),
                    self.fds.len() as libc::nfds_t,
                    timeout_ms,
                )
            };
            if rc >= 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }

        let before = events.len();
        for pfd in &self.fds {
            if pfd.revents == 0 {
                continue;
            }
            events.push(Readiness {
                fd: pfd.fd,
                readable: pfd.revents & POLLIN != 0,
                writable: pfd.revents & POLLOUT != 0,
                hangup: pfd.revents & POLLHUP != 0,
                error: pfd.revents & (POLLERR | POLLNVAL) != 0,
            });
        }
        Ok(events.len() - before)
    }

    fn interest(&self) -> &InterestSet {
        &self.interest
    }
}
