//! reactor-chat: a single-threaded TCP/UDP line server.
//!
//! Stream and datagram clients share one port and one line protocol:
//! - Plain text is echoed back
//! - `/time`, `/stats` and `/shutdown` are commands
//!
//! Everything runs on one thread around a mio poll loop.

pub mod config;
pub mod protocols;
pub mod runtime;
pub mod state;
