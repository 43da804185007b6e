//! Subscriber session: the render/aggregation loop and its shutdown path.
//!
//! [`FeedSession`] owns every piece of mutable session state (statistics,
//! rolling window, log file). Only the thread running the loop touches it;
//! the network worker communicates through the hand-off queue alone.

use std::thread;

use anyhow::{Context, Result};

use feed_bus::BusClient;
use feed_core::{
    ParseOutcome, RollingWindow, SessionStats, StatsSnapshot, Topic, parse_line, strip_topic,
};

use crate::config::SessionSettings;
use crate::dashboard::{Dashboard, DashboardView};
use crate::handoff::{self, HandoffReceiver};
use crate::log_writer::LogWriter;
use crate::signal::InterruptFlag;
use crate::worker::{CancellationSignal, NetworkWorker};

/// State of one subscriber session.
#[derive(Debug)]
pub struct FeedSession {
    topic: Topic,
    stats: SessionStats,
    window: RollingWindow<String>,
    log: LogWriter,
    settings: SessionSettings,
    producer_gone: bool,
}

impl FeedSession {
    pub fn new(topic: Topic, log: LogWriter, settings: SessionSettings) -> Self {
        Self {
            topic,
            stats: SessionStats::new(),
            window: RollingWindow::new(settings.window_capacity),
            log,
            settings,
            producer_gone: false,
        }
    }

    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub const fn window(&self) -> &RollingWindow<String> {
        &self.window
    }

    /// Applies one raw payload to the session state.
    ///
    /// A failed log write is reported and skipped; the message still counts.
    pub fn ingest(&mut self, raw: &str) -> ParseOutcome {
        let line = strip_topic(raw);
        let outcome = parse_line(line);
        if outcome.is_fallback() {
            tracing::debug!(line, "message not in chat format, attributing to unknown user");
        }

        self.stats.update(&outcome.message().user);
        self.window.push(line.to_string());
        if let Err(err) = self.log.append(line) {
            tracing::error!(path = %self.log.path().display(), error = %err, "failed to append to log");
        }
        outcome
    }

    /// Applies everything currently queued and returns the new message lines.
    pub fn drain(&mut self, queue: &HandoffReceiver) -> Vec<String> {
        let drained = queue.drain();
        if drained.producer_gone && !self.producer_gone {
            self.producer_gone = true;
            tracing::warn!("network worker stopped; no further messages will arrive");
        }

        drained
            .messages
            .iter()
            .map(|raw| {
                self.ingest(raw);
                strip_topic(raw).to_string()
            })
            .collect()
    }

    /// Builds the frame for the current state.
    pub fn view<'a>(&'a self, fresh: &'a [String]) -> DashboardView<'a> {
        DashboardView {
            topic: &self.topic,
            snapshot: self.stats.snapshot(),
            recent: self.window.contents().map(String::as_str).collect(),
            fresh,
        }
    }

    /// Runs frames until an interrupt arrives.
    ///
    /// Each frame drains the queue, draws once, then sleeps for the frame
    /// interval, so a burst of messages costs a single redraw.
    pub fn run<D: Dashboard + ?Sized>(
        &mut self,
        queue: &HandoffReceiver,
        dashboard: &mut D,
        interrupt: &InterruptFlag,
    ) -> Result<()> {
        loop {
            let fresh = self.drain(queue);
            dashboard.update(&self.view(&fresh))?;
            thread::sleep(self.settings.frame_interval);

            if interrupt.is_set() || dashboard.interrupt_requested()? {
                tracing::info!(topic = %self.topic, "interrupt received, shutting down");
                return Ok(());
            }
        }
    }

    /// Closes the log and returns the final statistics.
    pub fn finish(self) -> Result<StatsSnapshot> {
        let snapshot = self.stats.snapshot();
        let path = self.log.path().to_path_buf();
        self.log
            .close()
            .with_context(|| format!("failed to flush {}", path.display()))?;
        Ok(snapshot)
    }
}

/// Runs a complete subscriber session over `client`.
///
/// Spawns the network worker, runs the render loop until interrupted, then
/// shuts down in order: cancel the worker, join it (bounded), apply and draw
/// anything it queued, close the log, close the client, restore the terminal.
/// The shutdown steps run even when the loop fails.
pub fn run_subscriber<C, D>(
    client: C,
    mut session: FeedSession,
    dashboard: &mut D,
    interrupt: &InterruptFlag,
) -> Result<StatsSnapshot>
where
    C: BusClient + 'static,
    D: Dashboard + ?Sized,
{
    let settings = session.settings;
    let (tx, rx) = handoff::channel();
    let cancel = CancellationSignal::new();
    let worker = NetworkWorker::new(client, tx, cancel.clone(), settings.poll_timeout)
        .spawn()
        .context("failed to start network worker")?;

    let loop_result = session.run(&rx, dashboard, interrupt);

    cancel.cancel();
    let joined = worker.join_timeout(settings.join_timeout);
    // messages the worker picked up during its last poll still get shown
    let fresh = session.drain(&rx);
    let last_frame = if fresh.is_empty() {
        Ok(())
    } else {
        dashboard.update(&session.view(&fresh))
    };
    let finished = session.finish();
    if let Some((mut client, exit)) = joined {
        tracing::debug!(?exit, "network worker joined");
        client.close();
    }
    let restored = dashboard.restore();

    loop_result?;
    last_frame?;
    restored?;
    finished
}
