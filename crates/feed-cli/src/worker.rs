//! Background network worker.
//!
//! The worker is the only code that waits on the bus. It polls the client with
//! a short timeout, moves each payload onto the hand-off queue, and checks the
//! cancellation signal between polls. It never touches session state.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use feed_bus::{BusClient, BusError};

use crate::handoff::HandoffSender;

/// How often a pending join checks whether the worker has finished.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Shutdown flag set once by the render loop and read by the worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal(Arc<AtomicBool>);

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why the worker loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Cancelled,
    TransportClosed,
    QueueClosed,
}

/// Moves payloads from a bus client onto the hand-off queue.
pub struct NetworkWorker<C> {
    client: C,
    queue: HandoffSender,
    cancel: CancellationSignal,
    poll_timeout: Duration,
}

impl<C: BusClient> NetworkWorker<C> {
    pub const fn new(
        client: C,
        queue: HandoffSender,
        cancel: CancellationSignal,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            client,
            queue,
            cancel,
            poll_timeout,
        }
    }

    /// Runs until cancelled or the transport is gone.
    ///
    /// The client is handed back so the owner can close it.
    pub fn run(mut self) -> (C, WorkerExit) {
        tracing::debug!(poll_timeout = ?self.poll_timeout, "network worker started");
        let mut last_error: Option<String> = None;

        let exit = loop {
            if self.cancel.is_cancelled() {
                break WorkerExit::Cancelled;
            }

            let started = Instant::now();
            let received = match self.client.poll_ready(self.poll_timeout) {
                Ok(true) => self.client.try_receive(),
                Ok(false) => Ok(None),
                Err(err) => Err(err),
            };

            match received {
                Ok(Some(raw)) => {
                    last_error = None;
                    if self.queue.push(raw).is_err() {
                        break WorkerExit::QueueClosed;
                    }
                }
                Ok(None) => {}
                Err(err) if err.is_terminal() => {
                    tracing::info!(error = %err, "transport closed, network worker exiting");
                    break WorkerExit::TransportClosed;
                }
                Err(err) => {
                    report_transient(&err, &mut last_error);
                    // don't spin on clients that fail fast
                    thread::sleep(self.poll_timeout.saturating_sub(started.elapsed()));
                }
            }
        };

        tracing::debug!(?exit, "network worker stopped");
        (self.client, exit)
    }
}

impl<C: BusClient + 'static> NetworkWorker<C> {
    /// Starts the worker on its own thread.
    pub fn spawn(self) -> io::Result<WorkerHandle<C>> {
        let thread = thread::Builder::new()
            .name("feed-network".to_string())
            .spawn(move || self.run())?;
        Ok(WorkerHandle { thread })
    }
}

/// Logs a transient transport error, demoting repeats of the same error.
fn report_transient(err: &BusError, last_error: &mut Option<String>) {
    let message = err.to_string();
    if last_error.as_deref() == Some(message.as_str()) {
        tracing::debug!(error = %message, "transport error persists");
    } else {
        tracing::warn!(error = %message, "transport error, retrying");
        *last_error = Some(message);
    }
}

/// Handle to a running [`NetworkWorker`].
pub struct WorkerHandle<C> {
    thread: JoinHandle<(C, WorkerExit)>,
}

impl<C> WorkerHandle<C> {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits up to `timeout` for the worker to stop and returns its client.
    ///
    /// A worker still running at the deadline is detached and `None` is
    /// returned; its client is dropped whenever the thread ends.
    pub fn join_timeout(self, timeout: Duration) -> Option<(C, WorkerExit)> {
        let deadline = Instant::now() + timeout;
        while !self.thread.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(?timeout, "network worker did not stop in time, detaching");
                return None;
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }
        match self.thread.join() {
            Ok(finished) => Some(finished),
            Err(_) => {
                tracing::error!("network worker panicked");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use feed_bus::MemoryBus;

    use super::*;
    use crate::handoff;

    const POLL: Duration = Duration::from_millis(20);

    fn wait_until(limit: Duration, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + limit;
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached in {limit:?}");
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Client that replays a script of poll results.
    struct ScriptedClient {
        script: VecDeque<Result<Option<String>, BusError>>,
        ready: Option<String>,
    }

    impl BusClient for ScriptedClient {
        fn subscribe(&mut self, _topic: &str) -> Result<(), BusError> {
            Ok(())
        }

        fn poll_ready(&mut self, _timeout: Duration) -> Result<bool, BusError> {
            match self.script.pop_front() {
                Some(Ok(Some(raw))) => {
                    self.ready = Some(raw);
                    Ok(true)
                }
                Some(Ok(None)) => Ok(false),
                Some(Err(err)) => Err(err),
                None => Err(BusError::Closed),
            }
        }

        fn try_receive(&mut self) -> Result<Option<String>, BusError> {
            Ok(self.ready.take())
        }

        fn close(&mut self) {}
    }

    #[test]
    fn test_forwards_every_payload_in_order() {
        let bus = MemoryBus::new();
        let mut client = bus.subscriber();
        client.subscribe("news").unwrap();

        let (tx, rx) = handoff::channel();
        let cancel = CancellationSignal::new();
        let handle = NetworkWorker::new(client, tx, cancel.clone(), POLL)
            .spawn()
            .unwrap();

        for i in 0..100 {
            bus.publish(format!("news [10:00:00] u{i}: m{i}"));
        }

        let mut received = Vec::new();
        wait_until(Duration::from_secs(5), || {
            received.extend(rx.drain().messages);
            received.len() == 100
        });
        let expected: Vec<String> = (0..100)
            .map(|i| format!("news [10:00:00] u{i}: m{i}"))
            .collect();
        assert_eq!(received, expected);

        cancel.cancel();
        let (_client, exit) = handle.join_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(exit, WorkerExit::Cancelled);
    }

    #[test]
    fn test_cancellation_observed_within_poll_timeout() {
        let bus = MemoryBus::new();
        let mut client = bus.subscriber();
        client.subscribe("news").unwrap();
        let (tx, _rx) = handoff::channel();
        let cancel = CancellationSignal::new();
        let poll = Duration::from_millis(100);
        let handle = NetworkWorker::new(client, tx, cancel.clone(), poll)
            .spawn()
            .unwrap();

        thread::sleep(Duration::from_millis(30));
        let cancelled_at = Instant::now();
        cancel.cancel();
        let joined = handle.join_timeout(Duration::from_secs(1));

        assert!(joined.is_some());
        assert!(cancelled_at.elapsed() < poll + Duration::from_millis(100));
    }

    #[test]
    fn test_exits_when_transport_torn_down() {
        let bus = MemoryBus::new();
        let mut client = bus.subscriber();
        client.subscribe("news").unwrap();
        let (tx, rx) = handoff::channel();
        let handle = NetworkWorker::new(client, tx, CancellationSignal::new(), POLL)
            .spawn()
            .unwrap();

        bus.publish("news [10:00:00] bob: bye");
        bus.shutdown();

        wait_until(Duration::from_secs(5), || handle.is_finished());
        let (_client, exit) = handle.join_timeout(Duration::ZERO).unwrap();
        assert_eq!(exit, WorkerExit::TransportClosed);
        assert_eq!(rx.drain().messages, vec!["news [10:00:00] bob: bye"]);
        assert!(rx.drain().producer_gone);
    }

    #[test]
    fn test_transient_errors_do_not_stop_worker() {
        let disconnected = || BusError::Disconnected {
            address: "127.0.0.1:5555".to_string(),
            reason: "connection refused".to_string(),
        };
        let client = ScriptedClient {
            script: VecDeque::from([
                Err(disconnected()),
                Err(disconnected()),
                Ok(None),
                Ok(Some("news [10:00:00] bob: back".to_string())),
                Err(BusError::Io(io::Error::other("reset"))),
                Ok(Some("news [10:00:01] bob: again".to_string())),
            ]),
            ready: None,
        };
        let (tx, rx) = handoff::channel();

        let (_client, exit) =
            NetworkWorker::new(client, tx, CancellationSignal::new(), Duration::from_millis(1)).run();

        assert_eq!(exit, WorkerExit::TransportClosed);
        assert_eq!(
            rx.drain().messages,
            vec!["news [10:00:00] bob: back", "news [10:00:01] bob: again"]
        );
    }

    #[test]
    fn test_stops_when_render_loop_is_gone() {
        let client = ScriptedClient {
            script: VecDeque::from([Ok(Some("news x".to_string())), Ok(None)]),
            ready: None,
        };
        let (tx, rx) = handoff::channel();
        drop(rx);

        let (_client, exit) =
            NetworkWorker::new(client, tx, CancellationSignal::new(), POLL).run();
        assert_eq!(exit, WorkerExit::QueueClosed);
    }

    #[test]
    fn test_join_timeout_detaches_stuck_worker() {
        let stuck = thread::spawn(|| {
            thread::sleep(Duration::from_millis(500));
            ((), WorkerExit::Cancelled)
        });
        let handle = WorkerHandle { thread: stuck };

        let started = Instant::now();
        assert!(handle.join_timeout(Duration::from_millis(50)).is_none());
        assert!(started.elapsed() < Duration::from_millis(400));
    }
}
