//! Protocol implementations.
//!
//! - `chat`: line-delimited echo protocol with slash commands
//!   (`/time`, `/stats`, `/shutdown`)

pub mod chat;
