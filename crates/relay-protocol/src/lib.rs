//! Relay Protocol - Wire formatting for the TCP broadcast relay
//!
//! The relay has no framing of its own: the server treats every read as an
//! opaque chunk and rebroadcasts it with a `[ip:port]: ` prefix. This crate
//! owns that formatting, the display-only truncation policy, the operator
//! sentinel, newline assembly for line-oriented readers, and validation of
//! the startup parameters.

pub mod line;
pub mod message;
pub mod parse;

pub use line::{Feed, LineAssembler, DEFAULT_LINE_CAPACITY};
pub use message::{
    connected_notice, disconnected_notice, is_sentinel, peer_prefix, Relayed,
    DEFAULT_DISPLAY_LIMIT, SENTINEL, SERVER_TAG,
};
pub use parse::{parse_port, parse_server_ip, ParseError};
