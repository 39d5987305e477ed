//! Single-threaded readiness-driven runtime.
//!
//! One mio `Poll` watches the TCP listener, the UDP socket and every live
//! client connection. Handlers run synchronously on the polling thread:
//! - `Connection`: per-client state machine and output buffering
//! - `Source`: poll token classification
//! - `Server`: the reactor loop itself

mod connection;
mod error;
mod event_loop;
mod token;

pub use connection::{ConnState, Connection, ConnectionRegistry};
pub use error::{SetupError, SetupStage};
pub use event_loop::{Server, StopReason};
pub use token::Source;

use crate::config::Config;

/// Bind both transports and serve until shutdown.
///
/// Setup failures are returned as errors; how the loop ended is reported
/// through the `StopReason`.
pub fn run(config: &Config) -> Result<StopReason, SetupError> {
    let server = Server::bind(config)?;
    Ok(server.run())
}
