//! Chat protocol implementation.
//!
//! A line-oriented text protocol shared by the TCP and UDP transports:
//! - Plain text is echoed back
//! - Lines starting with `/` are commands, matched exactly
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  hello\n
//! Response: hello\n
//!
//! Request:  /time\n
//! Response: 2024-05-01 13:37:00\n
//!
//! Request:  /stats\n
//! Response: Total users: 2, Current users: 1\n
//!
//! Request:  /shutdown\n
//! Response: Server is shutting down...\n
//!
//! Request:  /bogus\n
//! Response: Unknown command: /bogus\n
//! ```

pub mod handler;
pub mod parser;

pub use handler::respond;
