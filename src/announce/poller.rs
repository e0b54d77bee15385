//! Fixed-delay reconciliation driver.

use super::engine::AnnounceEngine;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Drives the engine on a fixed delay with no overlapping ticks: the next
/// tick is scheduled only after the delay following the previous tick's
/// completion. Tick-level errors are logged and the loop keeps going; the
/// next tick is the retry mechanism.
pub struct Poller {
    engine: Arc<AnnounceEngine>,
    tick_delay: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new(engine: Arc<AnnounceEngine>, tick_delay: Duration) -> Self {
        Self {
            engine,
            tick_delay,
            handle: Mutex::new(None),
        }
    }

    /// Starts the polling loop, aborting any previous one.
    pub fn start(&self) {
        let engine = Arc::clone(&self.engine);
        let delay = self.tick_delay;

        let handle = tokio::spawn(async move {
            info!(delay_secs = delay.as_secs(), "Starting announce poller");
            loop {
                match engine.run_tick().await {
                    Ok(summary) => debug!(
                        guilds = summary.guilds,
                        targets = summary.targets,
                        live = summary.live,
                        skipped = summary.skipped,
                        "Tick complete"
                    ),
                    Err(e) => error!(error = %e, "Tick failed"),
                }
                tokio::time::sleep(delay).await;
            }
        });

        let mut slot = self.handle.lock().unwrap();
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// Stops the polling loop. An in-flight tick is cancelled; per-guild
    /// bookkeeping saves are whole-document, so nothing is left half-written.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
            info!("Announce poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        // Best-effort abort; a poisoned lock just means the loop panicked
        if let Ok(mut slot) = self.handle.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
