//! Process interrupt handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};

/// Set when the user asks the session to end.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Sets `flag` on the first SIGINT (Ctrl-C) instead of killing the process.
///
/// Waits on a single-threaded tokio runtime parked on its own thread, so the
/// rest of the program stays synchronous.
pub fn install_ctrl_c(flag: &InterruptFlag) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    let flag = flag.clone();

    thread::Builder::new()
        .name("feed-signal".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::debug!("interrupt received");
                        flag.trigger();
                    }
                    Err(err) => tracing::warn!(error = %err, "failed to listen for interrupts"),
                }
            });
        })
        .context("failed to spawn signal thread")?;
    Ok(())
}
