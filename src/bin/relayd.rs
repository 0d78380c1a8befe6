//! Relay Daemon - TCP broadcast relay server
//!
//! Accepts any number of TCP clients and rebroadcasts every chunk one of
//! them sends, labelled `[ip:port]: `, to all connected clients. Lines typed
//! on standard input are broadcast as `[SERVER]: line`; `exit()` stops the
//! server.
//!
//! # Usage
//!
//! ```bash
//! # Interactive console on the terminal
//! relayd 9000
//!
//! # Log notices to stderr instead, using select(2)
//! relayd 9000 --plain --backend select
//!
//! # Settings from a file, flags still win
//! relayd 9000 --config relay.toml --no-echo
//! ```

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsFd;
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relay_core::{Console, ConsoleSink, TracingSink};
use relay_protocol::parse_port;
use relayd::config::ServerConfig;
use relayd::poller::Backend;
use relayd::server::{RelayServer, ShutdownReason};

/// TCP broadcast relay server
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// Port to listen on (1-65535)
    #[arg(value_parser = parse_port)]
    port: u16,

    /// Log notices instead of drawing the console
    #[arg(long)]
    plain: bool,

    /// Readiness primitive
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Payload bytes shown per console line
    #[arg(long)]
    display_limit: Option<usize>,

    /// Do not send a client's message back to it
    #[arg(long)]
    no_echo: bool,

    /// Ignore standard input; run until killed
    #[arg(long)]
    no_stdin: bool,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    /// File settings overlaid with command-line flags.
    fn server_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ServerConfig::default(),
        };

        config.port = self.port;
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(limit) = self.display_limit {
            config.display_limit = limit;
        }
        if self.no_echo {
            config.echo_to_sender = false;
        }
        if self.plain {
            config.interactive = false;
        }
        Ok(config)
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("relay")
        .join("relayd.log")
}

fn create_log_file() -> Option<File> {
    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Failed to create log directory {parent:?}: {e}");
            return None;
        }
    }

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {log_path:?}: {e}");
            None
        }
    }
}

fn default_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("relayd=info".parse()?)
        .add_directive("relay_core=info".parse()?)
        .add_directive("relay_protocol=info".parse()?))
}

/// Logs to a file while the console owns the terminal, to stderr otherwise.
fn init_logging(interactive: bool) -> Result<()> {
    if !interactive {
        tracing_subscriber::fmt()
            .with_env_filter(default_filter()?)
            .with_writer(io::stderr)
            .init();
        return Ok(());
    }

    match create_log_file() {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(default_filter()?)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("off"))
            .init(),
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.server_config()?;
    let interactive = config.interactive;

    init_logging(interactive)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        port = config.port,
        "Relay server starting"
    );

    let server = RelayServer::bind(config).context("Failed to start server")?;

    // A duplicate of stdin read directly, bypassing std's buffered handle.
    let operator = if args.no_stdin {
        None
    } else {
        let fd = io::stdin()
            .as_fd()
            .try_clone_to_owned()
            .context("Failed to duplicate stdin")?;
        Some(File::from(fd))
    };

    let result = if interactive {
        let mut console = Console::stdout();
        console.init().context("Failed to initialize console")?;
        let result = server.run(operator, &mut console);
        if let Err(e) = console.restore() {
            error!(error = %e, "Failed to restore console");
        }
        result
    } else {
        let mut sink = TracingSink;
        server.run(operator, &mut sink as &mut dyn ConsoleSink)
    };

    let reason: ShutdownReason = result.context("Relay server failed")?;
    info!(reason = ?reason, "Relay server exiting");
    println!("Exited successfully.");
    Ok(())
}
