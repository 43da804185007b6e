//! Core domain logic for the live message feed.
//!
//! This crate contains the I/O-free parts of a subscriber session:
//! - Message parsing: splitting `"<topic> [<time>] <user>: <body>"` payloads
//! - Statistics: per-user counts, message rate and top users
//! - Rolling window: the last N messages shown on screen

pub mod message;
pub mod stats;
pub mod types;
pub mod window;

pub use message::{
    ParseOutcome, ParsedMessage, UNKNOWN_USER, format_line, format_payload, parse_line, parse_raw,
    strip_topic,
};
pub use stats::{SessionStats, StatsSnapshot, TOP_USERS, UserCount};
pub use types::{Topic, ValidationError};
pub use window::{DEFAULT_WINDOW_CAPACITY, RollingWindow};
