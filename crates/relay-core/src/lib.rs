//! Relay Core - Shared pieces of the TCP broadcast relay
//!
//! This crate provides the message console used by both the relay server
//! (relayd) and the direct client (relay).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod console;

pub use console::{
    Console, ConsoleSink, TracingSink, EXIT_ROW, HEADER, MAX_ENTRY_CHARS, MAX_MESSAGES, PROMPT_ROW,
};
