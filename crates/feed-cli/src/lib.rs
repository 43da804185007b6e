//! Live message feed CLI library.
//!
//! Wires the transport from `feed-bus` and the session logic from
//! `feed-core` into the publisher and subscriber commands.

mod cli;
pub mod commands;
mod config;
pub mod dashboard;
pub mod handoff;
pub mod log_writer;
pub mod session;
pub mod signal;
pub mod worker;

pub use cli::{Cli, Commands};
pub use config::{Config, SessionSettings};
