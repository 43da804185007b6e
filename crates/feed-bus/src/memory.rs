//! In-process bus over channels.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};

use crate::{BusClient, BusError, TopicFilter};

/// A bus living inside the current process.
///
/// Clones share the same set of subscribers. Once every clone is dropped, or
/// [`MemoryBus::shutdown`] is called, subscribers drain what was already
/// published and then report [`BusError::Closed`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    subscribers: Arc<Mutex<Vec<Sender<String>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new subscriber. It receives payloads published from now on.
    pub fn subscriber(&self) -> MemorySubscriber {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        MemorySubscriber {
            rx: Some(rx),
            filter: TopicFilter::default(),
            ready: VecDeque::new(),
        }
    }

    /// Delivers `payload` to every live subscriber and returns how many there were.
    pub fn publish(&self, payload: impl Into<String>) -> usize {
        let payload = payload.into();
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(payload.clone()).is_ok());
        subscribers.len()
    }

    /// Tears the bus down for every subscriber.
    pub fn shutdown(&self) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Subscriber attached to a [`MemoryBus`].
#[derive(Debug)]
pub struct MemorySubscriber {
    rx: Option<Receiver<String>>,
    filter: TopicFilter,
    ready: VecDeque<String>,
}

impl BusClient for MemorySubscriber {
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        if self.rx.is_none() {
            return Err(BusError::Closed);
        }
        self.filter.subscribe(topic);
        let filter = &self.filter;
        self.ready.retain(|payload| filter.matches(payload));
        Ok(())
    }

    fn poll_ready(&mut self, timeout: Duration) -> Result<bool, BusError> {
        let Some(rx) = self.rx.as_ref() else {
            return Err(BusError::Closed);
        };
        if !self.ready.is_empty() {
            return Ok(true);
        }

        let deadline = Instant::now() + timeout;
        loop {
            match rx.recv_deadline(deadline) {
                Ok(payload) if self.filter.matches(&payload) => {
                    self.ready.push_back(payload);
                    return Ok(true);
                }
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => return Ok(false),
                Err(RecvTimeoutError::Disconnected) => return Err(BusError::Closed),
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<String>, BusError> {
        let Some(rx) = self.rx.as_ref() else {
            return Err(BusError::Closed);
        };
        if let Some(payload) = self.ready.pop_front() {
            return Ok(Some(payload));
        }
        loop {
            match rx.try_recv() {
                Ok(payload) if self.filter.matches(&payload) => return Ok(Some(payload)),
                Ok(_) => {}
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(BusError::Closed),
            }
        }
    }

    fn close(&mut self) {
        self.rx = None;
        self.ready.clear();
    }
}
