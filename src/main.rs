//! Group Relay Server - Entry Point
//!
//! Parses the port, binds the listener and runs until Ctrl-C or a listener failure.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use group_relay::{run, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Missing or invalid port prints usage and exits
    let config = ServerConfig::parse();

    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=group_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("group_relay=info")),
        )
        .init();

    tokio::select! {
        result = run(config) => {
            if let Err(e) = &result {
                error!("Listener failure, shutting down: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
        }
    }

    Ok(())
}
