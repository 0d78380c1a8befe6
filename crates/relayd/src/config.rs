//! Server configuration.
//!
//! Values come from [`ServerConfig::default`], optionally overlaid by a TOML
//! file, then by command-line flags in the binary:
//!
//! ```toml
//! port = 9000
//! backend = "select"
//! display_limit = 100
//! read_buffer_size = 8192
//! echo_to_sender = true
//! interactive = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use relay_protocol::DEFAULT_DISPLAY_LIMIT;
use serde::Deserialize;
use thiserror::Error;

use crate::poller::Backend;

/// Pending connections the kernel queues before `accept`.
pub const LISTEN_BACKLOG: i32 = 10;

/// Bytes read from a client per readiness event.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8192;

/// Configuration for [`crate::server::RelayServer`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// TCP port bound on `0.0.0.0`. `0` asks the kernel for a free port.
    pub port: u16,

    /// Readiness primitive.
    pub backend: Backend,

    /// Payload bytes shown in a console label. Wire messages are never
    /// truncated.
    pub display_limit: usize,

    /// Size of the per-read buffer.
    pub read_buffer_size: usize,

    /// Whether the sender also receives its own labelled message.
    pub echo_to_sender: bool,

    /// Draw the operator console on stdout instead of logging notices.
    pub interactive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            backend: Backend::default(),
            display_limit: DEFAULT_DISPLAY_LIMIT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            echo_to_sender: true,
            interactive: true,
        }
    }
}

impl ServerConfig {
    /// Default configuration on `port`.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Rejects values the event loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "read_buffer_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
