//! Relay server: listening socket, acceptance path and the event loop.
//!
//! The server owns everything it touches:
//! - the listening socket (closed when [`RelayServer::run`] returns)
//! - the [`Registry`] of connections and its poller
//! - the [`ServerConfig`]
//!
//! # Tick
//!
//! ```text
//! wait ──▶ snapshot ──▶ accept (listener ready)
//!                           │
//!                           ▼
//!              read each ready client in registry order
//!                 ├─ 0 bytes / error ──▶ notice + detach
//!                 └─ data ──▶ label ──▶ broadcast ──▶ notices for peers lost
//!                           │
//!                           ▼
//!              operator lines ──▶ `exit()` / EOF ends the loop
//!                             └─▶ `[SERVER]: line` to everyone
//! ```
//!
//! A client accepted during a tick is not read until the next one: the
//! ready set and the traversal snapshot both predate the accept.

mod accept;
mod listener;
mod operator;

pub use accept::{accept_connection, Accepted};
pub use listener::create_listening_socket;
pub use operator::{OperatorInput, OperatorRead};

use std::collections::HashSet;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener};
use std::os::unix::io::{AsRawFd, RawFd};

use relay_core::ConsoleSink;
use relay_protocol::{connected_notice, disconnected_notice, is_sentinel, Relayed};
use tracing::{debug, info, warn};

use crate::broadcast::{broadcast, Recipients};
use crate::config::{ConfigError, ServerConfig, LISTEN_BACKLOG};
use crate::poller::{Poller, Readiness};
use crate::registry::Registry;

/// Why the event loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The operator typed the sentinel.
    Sentinel,
    /// Operator input reached end of file.
    InputClosed,
}

/// Single-threaded broadcast relay.
pub struct RelayServer {
    listener: TcpListener,
    registry: Registry,
    config: ServerConfig,
    local_addr: SocketAddr,
    read_buf: Vec<u8>,
}

impl RelayServer {
    /// Creates the listening socket and an empty registry watched by the
    /// configured backend.
    ///
    /// Nothing is accepted until [`RelayServer::run`] is called.
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let poller = config.backend.create();
        Self::bind_with_poller(config, poller)
    }

    /// Like [`RelayServer::bind`], with a caller-supplied poller.
    /// `config.backend` is ignored.
    pub fn bind_with_poller(
        config: ServerConfig,
        poller: Box<dyn Poller>,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = create_listening_socket(config.port, LISTEN_BACKLOG)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Listen {
                port: config.port,
                source,
            })?;

        let listener_fd = listener.as_raw_fd();
        let registry = Registry::new(listener_fd, poller).map_err(|source| {
            ServerError::Register {
                fd: listener_fd,
                source,
            }
        })?;

        info!(
            addr = %local_addr,
            backend = ?config.backend,
            echo_to_sender = config.echo_to_sender,
            "Relay listening"
        );

        Ok(Self {
            read_buf: vec![0; config.read_buffer_size],
            listener,
            registry,
            config,
            local_addr,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the event loop until the operator stops it or waiting fails.
    ///
    /// Without operator input the loop only ends on a fatal wait error.
    /// Whatever the outcome, every connection is closed and the listener
    /// is dropped before this returns. The console is left for the caller
    /// to restore.
    pub fn run<I, C>(
        mut self,
        operator: Option<I>,
        console: &mut C,
    ) -> Result<ShutdownReason, ServerError>
    where
        I: Read + AsRawFd,
        C: ConsoleSink + ?Sized,
    {
        let mut operator = match operator {
            Some(input) => {
                let input = OperatorInput::new(input);
                let fd = input.fd();
                self.registry
                    .watch(fd)
                    .map_err(|source| ServerError::Register { fd, source })?;
                Some(input)
            }
            None => None,
        };

        let result = self.event_loop(operator.as_mut(), console);

        if let Some(input) = &operator {
            self.registry.unwatch(input.fd());
        }
        self.shutdown();

        match &result {
            Ok(reason) => info!(reason = ?reason, "Relay stopped"),
            Err(e) => warn!(error = %e, "Relay stopped on error"),
        }
        result
    }

    fn event_loop<I, C>(
        &mut self,
        mut operator: Option<&mut OperatorInput<I>>,
        console: &mut C,
    ) -> Result<ShutdownReason, ServerError>
    where
        I: Read + AsRawFd,
        C: ConsoleSink + ?Sized,
    {
        let mut events: Vec<Readiness> = Vec::new();

        loop {
            events.clear();
            self.registry
                .wait(&mut events, None)
                .map_err(ServerError::Poll)?;

            let ready: HashSet<RawFd> = events
                .iter()
                .filter(|event| event.is_read_ready())
                .map(|event| event.fd)
                .collect();
            let snapshot = self.registry.descriptors();

            if ready.contains(&self.registry.listener_fd()) {
                self.accept_one(console);
            }

            for fd in snapshot {
                if ready.contains(&fd) {
                    self.service_client(fd, console);
                }
            }

            if let Some(input) = operator.as_deref_mut() {
                if ready.contains(&input.fd()) {
                    if let Some(reason) = self.service_operator(input, console) {
                        return Ok(reason);
                    }
                }
            }
        }
    }

    fn accept_one<C: ConsoleSink + ?Sized>(&mut self, console: &mut C) {
        match accept_connection(&self.listener) {
            Ok(Accepted::Connection(stream, peer)) => match self.registry.attach(stream, peer) {
                Ok(fd) => {
                    info!(fd, peer = %peer, clients = self.registry.len(), "Client connected");
                    notify(console, &connected_notice(&peer));
                }
                Err(e) => warn!(peer = %peer, error = %e, "Refused connection"),
            },
            Ok(Accepted::WouldBlock) => debug!("Spurious listener readiness"),
            Err(e) => warn!(error = %e, "Accept failed"),
        }
    }

    fn service_client<C: ConsoleSink + ?Sized>(&mut self, fd: RawFd, console: &mut C) {
        // Skip clients detached earlier in this tick.
        let (result, peer) = match self.registry.get(fd) {
            Some(conn) => (read_chunk(conn.stream(), &mut self.read_buf), conn.peer()),
            None => return,
        };

        let n = match result {
            Ok(0) => {
                info!(fd, peer = %peer, "Client closed connection");
                self.drop_client(fd, console);
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(fd, peer = %peer, error = %e, "Client read failed");
                self.drop_client(fd, console);
                return;
            }
        };

        let chunk = self.read_buf.get(..n).unwrap_or_default();
        let relayed = Relayed::from_peer(&peer, chunk, self.config.display_limit);
        notify(console, &relayed.display);

        let recipients = if self.config.echo_to_sender {
            Recipients::All
        } else {
            Recipients::AllExcept(fd)
        };
        self.fan_out(&relayed.wire, recipients, console);
    }

    /// Handles one operator read. Returns a reason when the loop must stop.
    fn service_operator<I, C>(
        &mut self,
        input: &mut OperatorInput<I>,
        console: &mut C,
    ) -> Option<ShutdownReason>
    where
        I: Read + AsRawFd,
        C: ConsoleSink + ?Sized,
    {
        let (lines, closed) = match input.read() {
            OperatorRead::Lines(lines) => (lines, false),
            OperatorRead::Closed(lines) => (lines, true),
        };

        for line in lines {
            if is_sentinel(&line) {
                return Some(ShutdownReason::Sentinel);
            }
            let relayed = Relayed::from_operator(&line);
            notify(console, &relayed.display);
            self.fan_out(&relayed.wire, Recipients::All, console);
        }

        closed.then_some(ShutdownReason::InputClosed)
    }

    fn fan_out<C: ConsoleSink + ?Sized>(
        &mut self,
        message: &[u8],
        recipients: Recipients,
        console: &mut C,
    ) {
        let report = broadcast(&mut self.registry, message, recipients);
        debug!(
            delivered = report.delivered,
            detached = report.detached.len(),
            failed = report.failed,
            "Broadcast complete"
        );
        for peer in &report.detached {
            notify(console, &disconnected_notice(peer));
        }
    }

    fn drop_client<C: ConsoleSink + ?Sized>(&mut self, fd: RawFd, console: &mut C) {
        if let Some(peer) = self.registry.detach(fd) {
            notify(console, &disconnected_notice(&peer));
        }
    }

    fn shutdown(mut self) {
        let closed = self.registry.detach_all();
        info!(closed, addr = %self.local_addr, "Closed all connections");
        drop(self.listener);
    }
}

/// Reads one chunk, retrying interrupted reads.
fn read_chunk<R: Read>(mut reader: R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

/// Shows a notice; a failing console never stops the relay.
fn notify<C: ConsoleSink + ?Sized>(console: &mut C, message: &str) {
    if let Err(e) = console.show(message) {
        warn!(error = %e, "Console update failed");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to listen on port {port}: {source}")]
    Listen {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Failed to watch descriptor {fd}: {source}")]
    Register {
        fd: RawFd,
        #[source]
        source: io::Error,
    },

    #[error("Waiting for readiness failed: {0}")]
    Poll(#[source] io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
