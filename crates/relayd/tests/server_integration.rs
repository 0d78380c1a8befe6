//! Integration tests for the relay server.
//!
//! Each test runs a real `RelayServer` on `127.0.0.1:0` in a background
//! thread, drives its operator input through a Unix socket pair, and talks
//! to it with plain TCP clients.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use relay_core::ConsoleSink;
use relayd::config::ServerConfig;
use relayd::poller::Backend;
use relayd::server::{RelayServer, ServerError, ShutdownReason};

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for the server to react.
const REACTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Interval between console checks.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How long a read must stay silent to count as "nothing delivered".
const SILENCE: Duration = Duration::from_millis(150);

// ============================================================================
// Test Helpers
// ============================================================================

/// Console sink shared between the server thread and the test.
#[derive(Clone, Default)]
struct SharedConsole(Arc<Mutex<Vec<String>>>);

impl SharedConsole {
    fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, pred: impl Fn(&str) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|m| pred(m)).count()
    }
}

impl ConsoleSink for SharedConsole {
    fn add_message(&mut self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }

    fn render(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Running server plus the handles needed to drive it.
struct TestServer {
    addr: SocketAddr,
    operator: UnixStream,
    console: SharedConsole,
    handle: JoinHandle<Result<ShutdownReason, ServerError>>,
}

impl TestServer {
    fn spawn() -> Self {
        Self::spawn_with(ServerConfig::new(0))
    }

    fn spawn_with(config: ServerConfig) -> Self {
        let (input, operator) = UnixStream::pair().expect("operator pair");
        let console = SharedConsole::default();
        let mut sink = console.clone();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let server = RelayServer::bind(config)?;
            tx.send(server.local_addr().port()).expect("report port");
            server.run(Some(input), &mut sink)
        });

        let port = rx
            .recv_timeout(REACTION_TIMEOUT)
            .expect("server did not bind");

        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            operator,
            console,
            handle,
        }
    }

    /// Connects a client and waits until the server has attached it.
    fn connect(&self) -> TestClient {
        let before = self.connected_count();
        let client = TestClient::connect(self.addr);
        self.wait_until(|| self.connected_count() > before, "client attach");
        client
    }

    fn connected_count(&self) -> usize {
        self.console.count(|m| m.starts_with("Client connected: "))
    }

    fn disconnected_count(&self) -> usize {
        self.console
            .count(|m| m.starts_with("Client ") && m.ends_with(" disconnected"))
    }

    fn wait_until(&self, cond: impl Fn() -> bool, what: &str) {
        let start = Instant::now();
        while start.elapsed() < REACTION_TIMEOUT {
            if cond() {
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }
        panic!("timed out waiting for {what}; console: {:?}", self.console.messages());
    }

    fn operator_line(&mut self, line: &str) {
        self.operator.write_all(line.as_bytes()).unwrap();
        self.operator.write_all(b"\n").unwrap();
    }

    /// Sends the sentinel and waits for the loop to finish.
    fn stop(mut self) -> ShutdownReason {
        self.operator_line("exit()");
        self.handle
            .join()
            .expect("server thread panicked")
            .expect("server failed")
    }
}

struct TestClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TestClient {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to server");
        stream.set_read_timeout(Some(REACTION_TIMEOUT)).unwrap();
        let writer = stream.try_clone().unwrap();
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.writer.local_addr().unwrap()
    }

    /// The label other peers see for this client.
    fn label(&self) -> String {
        let addr = self.local_addr();
        format!("[{}:{}]: ", addr.ip(), addr.port())
    }

    fn send(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).unwrap();
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read line");
        line
    }

    /// Asserts nothing arrives within [`SILENCE`].
    fn expect_silence(&mut self) {
        self.reader.get_ref().set_read_timeout(Some(SILENCE)).unwrap();
        let mut buf = [0u8; 64];
        match self.reader.read(&mut buf) {
            Err(e) => assert!(
                matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut),
                "unexpected error: {e}"
            ),
            Ok(n) => panic!("expected silence, got {:?}", String::from_utf8_lossy(&buf[..n])),
        }
        self.reader
            .get_ref()
            .set_read_timeout(Some(REACTION_TIMEOUT))
            .unwrap();
    }

    /// Reads until the peer closes. Returns what arrived first.
    fn read_to_eof(&mut self) -> Vec<u8> {
        let mut rest = Vec::new();
        self.reader.read_to_end(&mut rest).expect("read to eof");
        rest
    }

    /// Closes the connection with a reset instead of a FIN.
    fn abort(self) {
        let linger = libc::linger {
            l_onoff: 1,
            l_linger: 0,
        };
        // SAFETY: `linger` is a valid struct of the size passed.
        let rc = unsafe {
            libc::setsockopt(
                self.writer.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_LINGER,
                &linger as *const libc::linger as *const libc::c_void,
                std::mem::size_of::<libc::linger>() as libc::socklen_t,
            )
        };
        assert_eq!(rc, 0);
    }
}

// ============================================================================
// Relay Tests
// ============================================================================

#[test]
fn test_message_reaches_other_client_and_sender() {
    let server = TestServer::spawn();
    let mut a = server.connect();
    let mut b = server.connect();

    a.send(b"hello\n");
    let expected = format!("{}hello\n", a.label());
    assert_eq!(b.read_line(), expected);
    // The sender is echoed by default.
    assert_eq!(a.read_line(), expected);

    assert_eq!(server.stop(), ShutdownReason::Sentinel);
}

#[test]
fn test_no_echo_excludes_sender() {
    let config = ServerConfig {
        echo_to_sender: false,
        ..ServerConfig::new(0)
    };
    let server = TestServer::spawn_with(config);
    let mut a = server.connect();
    let mut b = server.connect();

    a.send(b"only for b\n");
    assert_eq!(b.read_line(), format!("{}only for b\n", a.label()));
    a.expect_silence();

    server.stop();
}

#[test]
fn test_select_backend_relays() {
    let config = ServerConfig {
        backend: Backend::Select,
        ..ServerConfig::new(0)
    };
    let server = TestServer::spawn_with(config);
    let mut a = server.connect();
    let mut b = server.connect();

    b.send(b"via select\n");
    assert_eq!(a.read_line(), format!("{}via select\n", b.label()));

    server.stop();
}

#[test]
fn test_console_shows_notices_and_labels() {
    let server = TestServer::spawn();
    let mut a = server.connect();
    let label = a.label();

    a.send(b"note\n");
    a.read_line();
    drop(a);
    server.wait_until(|| server.disconnected_count() == 1, "disconnect notice");

    let messages = server.console.messages();
    let addr = label.trim_start_matches('[').trim_end_matches("]: ").to_string();
    assert_eq!(
        messages,
        vec![
            format!("Client connected: {addr}"),
            format!("{label}note\n"),
            format!("Client {addr} disconnected"),
        ]
    );

    server.stop();
}

#[test]
fn test_long_message_is_delivered_in_full() {
    let server = TestServer::spawn();
    let mut a = server.connect();
    let mut b = server.connect();
    let label = a.label();

    let mut payload = vec![b'a'; 20_000];
    payload.push(b'\n');
    a.send(&payload);

    // Each read on the server becomes its own labelled chunk.
    let mut received = Vec::new();
    let mut total = 0;
    while !received.ends_with(b"\n") {
        let mut buf = [0u8; 4096];
        let n = b.reader.read(&mut buf).expect("read chunk");
        assert_ne!(n, 0, "server closed early");
        received.extend_from_slice(&buf[..n]);
        total += n;
    }
    assert!(total > payload.len());

    let text = String::from_utf8(received).unwrap();
    let stripped = text.replace(&label, "");
    assert_eq!(stripped.len(), payload.len());
    assert!(stripped.bytes().take(20_000).all(|byte| byte == b'a'));

    // The console label is truncated, the wire message is not.
    let shown = server
        .console
        .messages()
        .into_iter()
        .find(|m| m.starts_with(&label))
        .unwrap();
    assert_eq!(shown.len(), label.len() + 100);

    server.stop();
}

#[test]
fn test_operator_line_is_broadcast_to_everyone() {
    let mut server = TestServer::spawn();
    let mut a = server.connect();
    let mut b = server.connect();

    server.operator_line("maintenance at noon");
    assert_eq!(a.read_line(), "[SERVER]: maintenance at noon\n");
    assert_eq!(b.read_line(), "[SERVER]: maintenance at noon\n");

    server.stop();
}

// ============================================================================
// Disconnect Tests
// ============================================================================

#[test]
fn test_reset_client_is_removed_and_others_still_receive() {
    let server = TestServer::spawn();
    let a = server.connect();
    let mut b = server.connect();

    a.abort();
    server.wait_until(|| server.disconnected_count() == 1, "reset detection");

    b.send(b"still here\n");
    assert_eq!(b.read_line(), format!("{}still here\n", b.label()));

    server.stop();
}

#[test]
fn test_graceful_close_is_removed() {
    let server = TestServer::spawn();
    let a = server.connect();
    let mut b = server.connect();

    drop(a);
    server.wait_until(|| server.disconnected_count() == 1, "close detection");

    let mut c = server.connect();
    c.send(b"after\n");
    assert_eq!(b.read_line(), format!("{}after\n", c.label()));

    server.stop();
}

// ============================================================================
// Shutdown Tests
// ============================================================================

#[test]
fn test_sentinel_closes_every_client() {
    let server = TestServer::spawn();
    let mut a = server.connect();
    let mut b = server.connect();
    let addr = server.addr;

    assert_eq!(server.stop(), ShutdownReason::Sentinel);

    assert!(a.read_to_eof().is_empty());
    assert!(b.read_to_eof().is_empty());
    assert!(TcpStream::connect(addr).is_err(), "listener still open");
}

#[test]
fn test_operator_eof_stops_server() {
    let server = TestServer::spawn();
    let mut a = server.connect();

    server.operator.shutdown(std::net::Shutdown::Write).unwrap();
    let reason = server.handle.join().unwrap().unwrap();
    assert_eq!(reason, ShutdownReason::InputClosed);
    assert!(a.read_to_eof().is_empty());
}

#[test]
fn test_client_typing_sentinel_does_not_stop_server() {
    let server = TestServer::spawn();
    let mut a = server.connect();

    a.send(b"exit()\n");
    assert_eq!(a.read_line(), format!("{}exit()\n", a.label()));
    assert!(!server.handle.is_finished());

    server.stop();
}
