//! Client registry.
//!
//! The registry owns every live [`Connection`] and the [`Poller`] that
//! watches them, so membership and the interest set cannot drift apart:
//!
//! ```text
//! attach(stream) ──▶ connections.insert ──▶ poller.register ──▶ max updated
//! detach(fd)     ──▶ connections.remove ──▶ poller.unregister ──▶ socket closed
//! ```
//!
//! Order is newest first. Traversal works on a snapshot of descriptors
//! (see [`Registry::descriptors`]) so a connection detached mid-pass, e.g.
//! by a failed broadcast write, never disturbs the rest of the pass.

mod connection;

pub use connection::Connection;

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use tracing::debug;

use crate::poller::{Interest, Poller, Readiness};

/// Live connections plus the readiness interest set.
pub struct Registry {
    listener_fd: RawFd,
    connections: HashMap<RawFd, Connection>,
    /// Registry order, newest first.
    order: Vec<RawFd>,
    poller: Box<dyn Poller>,
}

impl Registry {
    /// Creates an empty registry whose interest set holds the listener.
    pub fn new(listener_fd: RawFd, mut poller: Box<dyn Poller>) -> io::Result<Self> {
        poller.register(listener_fd, Interest::READABLE)?;
        Ok(Self {
            listener_fd,
            connections: HashMap::new(),
            order: Vec::new(),
            poller,
        })
    }

    /// Inserts a new connection at the head and starts watching it.
    ///
    /// If the poller refuses the descriptor the stream is dropped (closed)
    /// and the error returned; the registry is left unchanged.
    pub fn attach(&mut self, stream: TcpStream, peer: SocketAddr) -> io::Result<RawFd> {
        let fd = stream.as_raw_fd();
        self.poller.register(fd, Interest::READABLE)?;

        self.connections.insert(fd, Connection::new(stream, peer));
        self.order.insert(0, fd);

        debug!(fd, peer = %peer, clients = self.connections.len(), "Client attached");
        Ok(fd)
    }

    /// Removes a connection, stops watching it and closes its socket.
    ///
    /// Returns the peer address of the removed connection, or `None` if
    /// `fd` is not registered (detaching twice is a no-op).
    pub fn detach(&mut self, fd: RawFd) -> Option<SocketAddr> {
        let connection = self.connections.remove(&fd)?;
        self.order.retain(|&member| member != fd);
        self.poller.unregister(fd);

        let peer = connection.peer();
        debug!(
            fd,
            peer = %peer,
            connected_secs = connection.age().num_seconds(),
            clients = self.connections.len(),
            "Client detached"
        );
        drop(connection);
        Some(peer)
    }

    /// Detaches every connection. Returns how many were closed.
    pub fn detach_all(&mut self) -> usize {
        let mut closed = 0;
        for fd in self.descriptors() {
            if self.detach(fd).is_some() {
                closed += 1;
            }
        }
        closed
    }

    /// Snapshot of registered descriptors in registry order (newest first).
    pub fn descriptors(&self) -> Vec<RawFd> {
        self.order.clone()
    }

    pub fn get(&self, fd: RawFd) -> Option<&Connection> {
        self.connections.get(&fd)
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        self.connections.contains_key(&fd)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn listener_fd(&self) -> RawFd {
        self.listener_fd
    }

    /// Largest descriptor of interest. Never below the listener's.
    pub fn max_descriptor(&self) -> RawFd {
        self.poller
            .max_descriptor()
            .map_or(self.listener_fd, |max| max.max(self.listener_fd))
    }

    /// Returns true if `fd` is currently in the interest set.
    pub fn is_watched(&self, fd: RawFd) -> bool {
        self.poller.interest().contains(fd)
    }

    /// Watches a descriptor that is not a client, e.g. operator input.
    pub fn watch(&mut self, fd: RawFd) -> io::Result<()> {
        self.poller.register(fd, Interest::READABLE)
    }

    /// Stops watching a descriptor added with [`Registry::watch`].
    pub fn unwatch(&mut self, fd: RawFd) -> bool {
        if self.connections.contains_key(&fd) || fd == self.listener_fd {
            return false;
        }
        self.poller.unregister(fd)
    }

    /// Waits for readiness on everything being watched.
    pub fn wait(
        &mut self,
        events: &mut Vec<Readiness>,
        timeout: Option<Duration>,
    ) -> io::Result<usize> {
        self.poller.wait(events, timeout)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::Backend;
    use std::io::Read;
    use std::net::TcpListener;

    struct Harness {
        listener: TcpListener,
        registry: Registry,
    }

    impl Harness {
        fn new(backend: Backend) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let registry = Registry::new(listener.as_raw_fd(), backend.create()).unwrap();
            Self { listener, registry }
        }

        /// Connects a client and attaches the server side. Returns the
        /// registered descriptor and the client end.
        fn connect(&mut self) -> (RawFd, TcpStream) {
            let client = TcpStream::connect(self.listener.local_addr().unwrap()).unwrap();
            let (server_side, peer) = self.listener.accept().unwrap();
            let fd = self.registry.attach(server_side, peer).unwrap();
            (fd, client)
        }

        fn assert_max_bounds_members(&self) {
            let max = self.registry.max_descriptor();
            assert!(max >= self.registry.listener_fd());
            for fd in self.registry.descriptors() {
                assert!(max >= fd);
            }
        }
    }

    #[test]
    fn test_empty_registry_max_is_listener() {
        let harness = Harness::new(Backend::Poll);
        assert!(harness.registry.is_empty());
        assert_eq!(
            harness.registry.max_descriptor(),
            harness.registry.listener_fd()
        );
        assert!(harness.registry.is_watched(harness.registry.listener_fd()));
    }

    #[test]
    fn test_attach_inserts_newest_first() {
        let mut harness = Harness::new(Backend::Poll);
        let (a, _ca) = harness.connect();
        let (b, _cb) = harness.connect();
        let (c, _cc) = harness.connect();

        assert_eq!(harness.registry.descriptors(), vec![c, b, a]);
        assert_eq!(harness.registry.len(), 3);
        for fd in [a, b, c] {
            assert!(harness.registry.is_watched(fd));
        }
        harness.assert_max_bounds_members();
    }

    #[test]
    fn test_detach_closes_and_unwatches() {
        let mut harness = Harness::new(Backend::Poll);
        let (fd, mut client) = harness.connect();

        let peer = harness.registry.detach(fd);
        assert!(peer.is_some());
        assert!(!harness.registry.contains(fd));
        assert!(!harness.registry.is_watched(fd));

        // Server side was closed: the client sees EOF.
        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_detach_unknown_is_noop() {
        let mut harness = Harness::new(Backend::Poll);
        let (_fd, _client) = harness.connect();
        let max_before = harness.registry.max_descriptor();

        assert_eq!(harness.registry.detach(9999), None);
        assert_eq!(harness.registry.len(), 1);
        assert_eq!(harness.registry.max_descriptor(), max_before);
    }

    #[test]
    fn test_double_detach_closes_once() {
        let mut harness = Harness::new(Backend::Poll);
        let (fd, _client) = harness.connect();
        let (other, _other_client) = harness.connect();

        assert!(harness.registry.detach(fd).is_some());
        assert!(harness.registry.detach(fd).is_none());
        assert_eq!(harness.registry.len(), 1);

        // The surviving connection's descriptor is still open and usable.
        let survivor = harness.registry.get(other).unwrap();
        assert!(survivor.stream().peer_addr().is_ok());
    }

    #[test]
    fn test_max_recomputed_after_removing_max() {
        for backend in [Backend::Poll, Backend::Select] {
            let mut harness = Harness::new(backend);
            let mut clients = Vec::new();
            let mut fds = Vec::new();
            for _ in 0..4 {
                let (fd, client) = harness.connect();
                fds.push(fd);
                clients.push(client);
            }

            let highest = *fds.iter().max().unwrap();
            assert_eq!(harness.registry.max_descriptor(), highest);

            harness.registry.detach(highest);
            harness.assert_max_bounds_members();
            let expected = fds.iter().copied().filter(|&fd| fd != highest).max().unwrap();
            assert_eq!(harness.registry.max_descriptor(), expected);

            assert_eq!(harness.registry.detach_all(), 3);
            assert_eq!(
                harness.registry.max_descriptor(),
                harness.registry.listener_fd()
            );
        }
    }

    #[test]
    fn test_watch_and_unwatch_auxiliary_descriptor() {
        let mut harness = Harness::new(Backend::Poll);
        let (aux, _peer) = std::os::unix::net::UnixStream::pair().unwrap();

        harness.registry.watch(aux.as_raw_fd()).unwrap();
        assert!(harness.registry.is_watched(aux.as_raw_fd()));
        assert!(harness.registry.is_empty());

        // The listener can never be unwatched this way.
        assert!(!harness.registry.unwatch(harness.registry.listener_fd()));
        assert!(harness.registry.unwatch(aux.as_raw_fd()));
        assert!(!harness.registry.is_watched(aux.as_raw_fd()));
    }
}
