//! Topic-based publish/subscribe transport.
//!
//! Subscribers implement [`BusClient`]: a topic subscription, a readiness poll
//! with a timeout, and a non-blocking receive. Two transports are provided:
//! - [`tcp`]: newline-delimited frames over TCP, one publisher fanning out to
//!   any number of subscribers
//! - [`memory`]: an in-process bus over channels, used in tests
//!
//! # Error semantics
//!
//! Every [`BusError`] except [`BusError::Closed`] is transient: the caller may
//! keep polling and the client recovers (for TCP, by reconnecting). `Closed`
//! means the client or the bus was torn down on purpose.

use std::io;
use std::time::Duration;

use thiserror::Error;

mod endpoint;
pub mod memory;
pub mod tcp;

pub use endpoint::Endpoint;
pub use memory::{MemoryBus, MemorySubscriber};
pub use tcp::{TcpPublisher, TcpSubscriber};

/// Transport errors.
#[derive(Debug, Error)]
pub enum BusError {
    /// An I/O error on an established connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    /// There is currently no connection to the publisher.
    #[error("not connected to {address}: {reason}")]
    Disconnected { address: String, reason: String },
    /// The client or the bus has been closed.
    #[error("bus client is closed")]
    Closed,
    /// The payload cannot be framed.
    #[error("payload must be a single line")]
    InvalidPayload,
    /// The endpoint string could not be parsed.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        endpoint: String,
        reason: &'static str,
    },
}

impl BusError {
    /// Whether the transport is gone for good and polling should stop.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Subscriber side of the bus.
pub trait BusClient: Send {
    /// Restricts delivery to payloads starting with `"<topic> "`.
    ///
    /// A session follows a single topic, so this replaces any previous
    /// subscription. Before the first call nothing is delivered.
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError>;

    /// Waits up to `timeout` for a payload to become available.
    fn poll_ready(&mut self, timeout: Duration) -> Result<bool, BusError>;

    /// Takes the next available payload without blocking.
    ///
    /// `Ok(None)` means nothing is available right now.
    fn try_receive(&mut self) -> Result<Option<String>, BusError>;

    /// Tears the client down. Later calls report [`BusError::Closed`].
    fn close(&mut self);
}

/// Subscriber-side topic filter shared by the transports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    prefix: Option<String>,
}

impl TopicFilter {
    pub fn subscribe(&mut self, topic: &str) {
        self.prefix = Some(format!("{topic} "));
    }

    pub fn matches(&self, payload: &str) -> bool {
        self.prefix
            .as_deref()
            .is_some_and(|prefix| payload.starts_with(prefix))
    }
}
