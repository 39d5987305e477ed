//! reactor-chat server binary.
//!
//! Loads configuration, installs the log subscriber and runs the reactor
//! until a client sends `/shutdown`.

use reactor_chat::config::Config;
use reactor_chat::runtime::{self, StopReason};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        framing = ?config.framing,
        read_buffer_size = config.read_buffer_size,
        "Starting reactor-chat server"
    );

    match runtime::run(&config) {
        Ok(StopReason::Shutdown) => info!("Shutdown requested by client"),
        // Already logged by the event loop
        Ok(StopReason::PollFailed(_)) => {}
        Err(e) => {
            error!(error = %e, "Server initialization failed");
            return Err(e.into());
        }
    }

    Ok(())
}
