//! Relay Display - single-connection line logger
//!
//! Accepts one client at a time and prints each line it sends as
//! `[ip]: line`. Runs until killed.
//!
//! # Usage
//!
//! ```bash
//! relay-display 9001
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use relay_core::TracingSink;
use relay_protocol::parse_port;
use relayd::display::DisplayServer;

/// Single-connection display server
#[derive(Parser, Debug)]
#[command(name = "relay-display", version, about)]
struct Args {
    /// Port to listen on (1-65535)
    #[arg(value_parser = parse_port)]
    port: u16,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relayd=info".parse()?)
                .add_directive("relay_core=info".parse()?),
        )
        .with_target(false)
        .init();

    let server = DisplayServer::bind(args.port).context("Failed to start display server")?;
    println!("Server listening on port {}", server.local_addr().port());

    server.run(&mut TracingSink)
}
