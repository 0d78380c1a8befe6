//! Validation of startup parameters.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Errors produced while validating command-line parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Port is empty, not decimal, or has trailing characters.
    #[error("Invalid port: {0:?} (expected a decimal number)")]
    PortFormat(String),

    /// Port is outside `1..=65535`.
    #[error("Invalid port: {0} (expected 1-65535)")]
    PortRange(String),

    /// Server address is not a dotted IPv4 address.
    #[error("Invalid IP address: {0:?}")]
    Address(String),
}

/// Parses a listening or connecting port.
///
/// Only plain decimal digits are accepted; signs, whitespace and trailing
/// characters are rejected, and the value must be in `1..=65535`.
pub fn parse_port(arg: &str) -> Result<u16, ParseError> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::PortFormat(arg.to_string()));
    }

    match arg.parse::<u32>() {
        Ok(port @ 1..=65535) => Ok(port as u16),
        _ => Err(ParseError::PortRange(arg.to_string())),
    }
}

/// Parses the server address given to the direct client.
pub fn parse_server_ip(arg: &str) -> Result<Ipv4Addr, ParseError> {
    arg.parse()
        .map_err(|_| ParseError::Address(arg.to_string()))
}
