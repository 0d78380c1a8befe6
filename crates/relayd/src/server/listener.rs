//! Listening socket setup.
//!
//! `std::net::TcpListener::bind` picks its own backlog, so the socket is
//! built by hand: `socket` → `SO_REUSEADDR` → `bind(0.0.0.0:port)` →
//! `listen(backlog)`, then handed to std.

use std::io;
use std::mem;
use std::net::TcpListener;
use std::os::fd::{FromRawFd, OwnedFd};

use super::ServerError;

fn check(rc: libc::c_int) -> io::Result<()> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn bind_and_listen(port: u16, backlog: i32) -> io::Result<TcpListener> {
    // SAFETY: plain socket(2) call; the result is checked before use.
    let raw = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `raw` is a freshly created descriptor nobody else owns. From
    // here on it is closed on every early return.
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    let enable: libc::c_int = 1;
    // SAFETY: `enable` outlives the call and its size is passed alongside.
    check(unsafe {
        libc::setsockopt(
            raw,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &enable as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    })?;

    // SAFETY: sockaddr_in is plain old data; zeroed is a valid value.
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    addr.sin_family = libc::AF_INET as libc::sa_family_t;
    addr.sin_port = port.to_be();
    addr.sin_addr = libc::in_addr {
        s_addr: libc::INADDR_ANY.to_be(),
    };

    // SAFETY: `addr` is a fully initialised sockaddr_in of the given size.
    check(unsafe {
        libc::bind(
            raw,
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    })?;

    // SAFETY: `raw` is a bound stream socket.
    check(unsafe { libc::listen(raw, backlog) })?;

    Ok(TcpListener::from(fd))
}

/// Creates the IPv4 listening socket on `0.0.0.0:port`.
///
/// The listener is non-blocking so a spurious readiness report can never
/// stall the event loop inside `accept`.
pub fn create_listening_socket(port: u16, backlog: i32) -> Result<TcpListener, ServerError> {
    let listener = bind_and_listen(port, backlog)
        .and_then(|listener| listener.set_nonblocking(true).map(|()| listener))
        .map_err(|source| ServerError::Listen { port, source })?;
    Ok(listener)
}
