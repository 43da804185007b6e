//! Hand-off queue between the network worker and the render loop.
//!
//! Single producer, single consumer, unbounded. Neither side ever blocks on
//! the other: the worker pushes, the render loop drains whatever is queued
//! at the start of a frame.

use crossbeam_channel::{Receiver, SendError, Sender, TryRecvError, unbounded};

/// Creates a connected producer/consumer pair.
pub fn channel() -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = unbounded();
    (HandoffSender { tx }, HandoffReceiver { rx })
}

/// Producer half, owned by the network worker. Deliberately not `Clone`.
#[derive(Debug)]
pub struct HandoffSender {
    tx: Sender<String>,
}

impl HandoffSender {
    /// Enqueues a raw payload. Fails only once the receiver is gone.
    pub fn push(&self, raw: String) -> Result<(), SendError<String>> {
        self.tx.send(raw)
    }
}

/// Consumer half, owned by the render loop.
#[derive(Debug)]
pub struct HandoffReceiver {
    rx: Receiver<String>,
}

/// Payloads taken from the queue in one drain.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Drained {
    /// In push order.
    pub messages: Vec<String>,
    /// The producer has gone away and the queue is empty.
    pub producer_gone: bool,
}

impl HandoffReceiver {
    /// Takes every payload queued at the time of the call, without blocking.
    ///
    /// Payloads pushed while draining are left for the next call, so a fast
    /// producer cannot keep a single drain running forever.
    pub fn drain(&self) -> Drained {
        let pending = self.rx.len();
        let mut drained = Drained {
            messages: Vec::with_capacity(pending),
            producer_gone: false,
        };
        while drained.messages.len() < pending.max(1) {
            match self.rx.try_recv() {
                Ok(raw) => drained.messages.push(raw),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    drained.producer_gone = true;
                    break;
                }
            }
        }
        drained
    }
}
