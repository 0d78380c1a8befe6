//! Relay Daemon - Connection-multiplexing broadcast server
//!
//! This crate provides the core of the TCP broadcast relay:
//! - `poller` - Readiness multiplexer (`poll(2)` and `select(2)` backends)
//! - `registry` - Live connections, kept in lock-step with the poller
//! - `broadcast` - Full-write fan-out to every registered connection
//! - `server` - Listening socket, acceptance path and the event loop
//! - `display` - Single-connection server that logs newline-delimited input
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      RelayServer::run                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │   Poller::wait ──▶ listener ready ──▶ accept ──▶ attach     │
//! │        │                                                    │
//! │        ├────────▶ client ready ──▶ read ──▶ broadcast       │
//! │        │                                        │           │
//! │        │                                        ▼           │
//! │        │                              detach on peer-gone   │
//! │        │                                                    │
//! │        └────────▶ operator ready ──▶ line / `exit()`        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on the calling thread. The only blocking points are the
//! poller wait and the write loop inside broadcast.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Per-connection failures remove that connection and never stop the loop

pub mod broadcast;
pub mod config;
pub mod display;
pub mod poller;
pub mod registry;
pub mod server;
