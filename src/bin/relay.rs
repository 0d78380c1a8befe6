//! Relay Client - direct chat client for `relayd`
//!
//! Connects to a relay server, sends every line typed on standard input and
//! draws what the server broadcasts in a scrolling console. `exit()` quits.
//!
//! # Usage
//!
//! ```bash
//! relay 127.0.0.1 9000
//! ```

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relay_client::{ClientConfig, ClientExit, RelayClient};
use relay_core::Console;

/// Direct client for the TCP broadcast relay
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
struct Args {
    /// Server IPv4 address
    server_ip: String,

    /// Server port (1-65535)
    port: String,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn create_log_file() -> Option<std::fs::File> {
    let log_dir = dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("relay");

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory {log_dir:?}: {e}");
        return None;
    }

    let log_path = log_dir.join("client.log");
    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {log_path:?}: {e}");
            None
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stderr would corrupt the console, so logs go to a file.
    if let Some(file) = create_log_file() {
        let filter = EnvFilter::from_default_env().add_directive(
            "relay_client=info"
                .parse()
                .unwrap_or_else(|_| tracing_subscriber::filter::Directive::from(tracing::Level::INFO)),
        );
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("off"))
            .init();
    }

    let config = ClientConfig::from_args(&args.server_ip, &args.port)?;
    let client = RelayClient::connect(&config).await?;
    println!("Connected to {}", client.server_addr());

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Error waiting for Ctrl-C");
            return;
        }
        info!("Interrupt received");
        shutdown_token.cancel();
    });

    let mut console = Console::stdout();
    console.init().context("Failed to initialize console")?;

    let input = BufReader::new(tokio::io::stdin());
    let result = client.run(input, &mut console, cancel_token).await;

    if let Err(e) = console.restore() {
        error!(error = %e, "Failed to restore console");
    }

    match result? {
        ClientExit::ServerClosed => println!("Server disconnected"),
        ClientExit::Sentinel | ClientExit::InputClosed | ClientExit::Cancelled => {}
    }
    println!("Exited successfully.");
    Ok(())
}
