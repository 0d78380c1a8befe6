//! Direct client for the relay server.
//!
//! The client watches two sources at once:
//! - local input lines, forwarded to the server with a trailing newline
//! - the server socket, whose chunks are shown in the console as received
//!
//! It stops when the user types `exit()`, local input ends, the server goes
//! away, or the cancellation token fires.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use relay_core::ConsoleSink;
use relay_protocol::{is_sentinel, parse_port, parse_server_ip, DEFAULT_DISPLAY_LIMIT};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};

/// Bytes read from the server per chunk.
const RECEIVE_BUFFER_SIZE: usize = 8192;

// ============================================================================
// Configuration
// ============================================================================

/// Where to connect and how much of each chunk to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_ip: Ipv4Addr,
    pub port: u16,
    /// Characters of a received chunk pushed into the console.
    pub display_limit: usize,
}

impl ClientConfig {
    pub fn new(server_ip: Ipv4Addr, port: u16) -> Self {
        Self {
            server_ip,
            port,
            display_limit: DEFAULT_DISPLAY_LIMIT,
        }
    }

    /// Validates the `<server_ip> <port>` command-line pair.
    pub fn from_args(server_ip: &str, port: &str) -> Result<Self> {
        Ok(Self::new(parse_server_ip(server_ip)?, parse_port(port)?))
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.server_ip, self.port))
    }
}

// ============================================================================
// Client
// ============================================================================

/// Why [`RelayClient::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// The user typed the sentinel.
    Sentinel,
    /// Local input reached end of file.
    InputClosed,
    /// The server closed the connection or the socket failed.
    ServerClosed,
    /// The cancellation token fired.
    Cancelled,
}

/// One connection to a relay server.
pub struct RelayClient {
    stream: TcpStream,
    server: SocketAddr,
    display_limit: usize,
}

impl RelayClient {
    /// Connects to the configured server.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let addr = config.addr();
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect { addr, source })?;
        info!(server = %addr, "Connected to server");
        Ok(Self {
            stream,
            server: addr,
            display_limit: config.display_limit,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// Runs until one of the stop conditions in [`ClientExit`].
    ///
    /// Only a failure reading `input` is an error; socket failures end the
    /// session as [`ClientExit::ServerClosed`].
    pub async fn run<R, C>(
        self,
        input: R,
        console: &mut C,
        cancel: CancellationToken,
    ) -> Result<ClientExit>
    where
        R: AsyncBufRead + Unpin,
        C: ConsoleSink + ?Sized,
    {
        let (mut reader, mut writer) = self.stream.into_split();
        let mut lines = input.lines();
        let mut buf = vec![0u8; RECEIVE_BUFFER_SIZE];

        let exit = loop {
            tokio::select! {
                _ = cancel.cancelled() => break ClientExit::Cancelled,

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break ClientExit::InputClosed;
                    };
                    if is_sentinel(&line) {
                        break ClientExit::Sentinel;
                    }
                    let mut message = line.into_bytes();
                    message.push(b'\n');
                    if let Err(e) = writer.write_all(&message).await {
                        warn!(server = %self.server, error = %e, "Failed to send message");
                        break ClientExit::ServerClosed;
                    }
                }

                received = reader.read(&mut buf) => {
                    match received {
                        Ok(0) => break ClientExit::ServerClosed,
                        Ok(n) => {
                            let text = String::from_utf8_lossy(buf.get(..n).unwrap_or_default());
                            let shown: String = text.chars().take(self.display_limit).collect();
                            if let Err(e) = console.show(&shown) {
                                warn!(error = %e, "Console update failed");
                            }
                        }
                        Err(e) => {
                            debug!(server = %self.server, error = %e, "Receive failed");
                            break ClientExit::ServerClosed;
                        }
                    }
                }
            }
        };

        info!(server = %self.server, exit = ?exit, "Client stopped");
        Ok(exit)
    }
}
