//! Chat message wire format.
//!
//! Payloads on the bus look like `"<topic> [<HH:MM:SS>] <user>: <body>"`.
//! The topic token is only used for filtering; everything after it is the
//! message line that gets displayed and logged.

use crate::types::Topic;

/// User recorded for lines that do not follow the chat format.
pub const UNKNOWN_USER: &str = "unknown";

/// A message line split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// The `HH:MM:SS` stamp set by the publisher, if the line had one.
    pub timestamp: Option<String>,
    /// The sender, or [`UNKNOWN_USER`].
    pub user: String,
    /// The message text.
    pub body: String,
}

/// Result of parsing a message line.
///
/// Parsing never fails: a line that does not match the chat format is kept
/// whole as the body of a [`ParseOutcome::Fallback`] attributed to
/// [`UNKNOWN_USER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The line matched `[<timestamp>] <user>: <body>`.
    Structured(ParsedMessage),
    /// The line did not match and is attributed to the unknown user.
    Fallback(ParsedMessage),
}

impl ParseOutcome {
    pub const fn message(&self) -> &ParsedMessage {
        match self {
            Self::Structured(message) | Self::Fallback(message) => message,
        }
    }

    pub fn into_message(self) -> ParsedMessage {
        match self {
            Self::Structured(message) | Self::Fallback(message) => message,
        }
    }

    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Removes the leading topic token from a raw payload.
///
/// A payload without a space has no separable topic and is returned whole,
/// so that nothing received is ever dropped.
pub fn strip_topic(raw: &str) -> &str {
    raw.split_once(' ').map_or(raw, |(_, rest)| rest)
}

/// Parses a message line (a payload with its topic already stripped).
///
/// Lines that do not split into `[<timestamp>] <user>: <body>` fall back to
/// [`UNKNOWN_USER`] with the whole line as the body. An empty user counts as
/// a failed split, so `"[t] : x"` is attributed to `unknown` with body
/// `"[t] : x"`.
pub fn parse_line(line: &str) -> ParseOutcome {
    match split_line(line) {
        Some(message) => ParseOutcome::Structured(message),
        None => ParseOutcome::Fallback(ParsedMessage {
            timestamp: None,
            user: UNKNOWN_USER.to_string(),
            body: line.to_string(),
        }),
    }
}

/// Parses a raw payload as received from the bus.
pub fn parse_raw(raw: &str) -> ParseOutcome {
    parse_line(strip_topic(raw))
}

fn split_line(line: &str) -> Option<ParsedMessage> {
    let (stamp, rest) = line.split_once("] ")?;
    let (user, body) = rest.split_once(": ")?;
    if user.is_empty() {
        return None;
    }
    let stamp = stamp.strip_prefix('[').unwrap_or(stamp);
    Some(ParsedMessage {
        timestamp: Some(stamp.to_string()),
        user: user.to_string(),
        body: body.to_string(),
    })
}

/// Formats a chat line as published: `[<timestamp>] <user>: <body>`.
pub fn format_line(timestamp: &str, user: &str, body: &str) -> String {
    format!("[{timestamp}] {user}: {body}")
}

/// Prefixes a chat line with its topic to form a bus payload.
pub fn format_payload(topic: &Topic, line: &str) -> String {
    format!("{topic} {line}")
}
