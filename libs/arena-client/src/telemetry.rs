//! Engagement-time telemetry.
//!
//! A background task counts one unit per tick while the page is visible and
//! the account is signed in. Units are flushed to the accounts service when the
//! threshold is reached, when the page is hidden, and on shutdown. The buffer
//! is zeroed before the request goes out, so delivery is at-most-once unless
//! restore-on-failure is enabled.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::services::AccountsService;

/// Consecutive failed flushes whose units are put back before giving up
pub const MAX_RESTORE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    pub tick: Duration,
    pub flush_threshold: u32,
    pub restore_on_failure: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            flush_threshold: 5,
            restore_on_failure: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct TelemetryBuffer {
    unsynced_units: u32,
    failed_flushes: u32,
}

impl TelemetryBuffer {
    pub fn unsynced_units(&self) -> u32 {
        self.unsynced_units
    }

    /// Count one unit, returning the new total
    pub fn record_unit(&mut self) -> u32 {
        self.unsynced_units = self.unsynced_units.saturating_add(1);
        self.unsynced_units
    }

    /// Read and zero the buffer
    pub fn take(&mut self) -> u32 {
        std::mem::take(&mut self.unsynced_units)
    }

    fn flush_succeeded(&mut self) {
        self.failed_flushes = 0;
    }

    /// Put units from a failed flush back. Returns false once the cap is hit.
    fn restore(&mut self, units: u32) -> bool {
        if self.failed_flushes >= MAX_RESTORE_ATTEMPTS {
            return false;
        }
        self.failed_flushes += 1;
        self.unsynced_units = self.unsynced_units.saturating_add(units);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushReason {
    Threshold,
    Hidden,
    Teardown,
}

/// Shared between the ticking task and the detached flush requests
struct Flusher {
    accounts: Arc<dyn AccountsService>,
    uid: String,
    buffer: Arc<Mutex<TelemetryBuffer>>,
    restore_on_failure: bool,
}

impl Flusher {
    /// Zero the buffer and send its units on a task that outlives the batcher
    fn flush(&self, reason: FlushReason) -> Option<JoinHandle<()>> {
        let minutes = self.buffer.lock().take();
        if minutes == 0 {
            return None;
        }

        debug!(minutes, reason = ?reason, "flushing engagement time");

        let accounts = self.accounts.clone();
        let uid = self.uid.clone();
        let buffer = self.buffer.clone();
        let restore = self.restore_on_failure;

        Some(tokio::spawn(async move {
            match accounts.update_time(&uid, minutes).await {
                Ok(()) => {
                    buffer.lock().flush_succeeded();
                    info!(minutes, "engagement time synced");
                }
                Err(e) if restore => {
                    if buffer.lock().restore(minutes) {
                        warn!(minutes, error = %e, "time update failed; units restored");
                    } else {
                        error!(minutes, error = %e, "time update failed; restore cap reached, units dropped");
                    }
                }
                Err(e) => {
                    warn!(minutes, error = %e, "time update failed; units dropped");
                }
            }
        }))
    }
}

/// Handle to the running batcher
pub struct TelemetryBatcher {
    buffer: Arc<Mutex<TelemetryBuffer>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Option<JoinHandle<()>>>,
}

impl TelemetryBatcher {
    /// Start ticking. `visibility` is true while the page is in the foreground.
    /// With no `user_id` the batcher idles until shutdown.
    pub fn spawn(
        accounts: Arc<dyn AccountsService>,
        user_id: Option<String>,
        visibility: watch::Receiver<bool>,
        settings: TelemetrySettings,
    ) -> Self {
        let buffer = Arc::new(Mutex::new(TelemetryBuffer::default()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let flusher = user_id.map(|uid| Flusher {
            accounts,
            uid,
            buffer: buffer.clone(),
            restore_on_failure: settings.restore_on_failure,
        });

        let task = tokio::spawn(tick_loop(flusher, visibility, settings, shutdown_rx));

        Self {
            buffer,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    pub fn unsynced_units(&self) -> u32 {
        self.buffer.lock().unsynced_units()
    }

    /// Stop ticking and flush what is buffered.
    ///
    /// Returns the in-flight final flush, if any, so the caller can wait for
    /// delivery before the process exits.
    pub async fn shutdown(mut self) -> Option<JoinHandle<()>> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match (&mut self.task).await {
            Ok(flush) => flush,
            Err(e) => {
                error!(error = %e, "telemetry task failed");
                None
            }
        }
    }
}

async fn tick_loop(
    flusher: Option<Flusher>,
    mut visibility: watch::Receiver<bool>,
    settings: TelemetrySettings,
    mut shutdown: oneshot::Receiver<()>,
) -> Option<JoinHandle<()>> {
    let Some(flusher) = flusher else {
        debug!("anonymous session; telemetry idle");
        let _ = shutdown.await;
        return None;
    };

    let threshold = settings.flush_threshold.max(1);
    let mut visible = *visibility.borrow_and_update();
    let mut signal_open = true;

    let mut ticker = interval_at(Instant::now() + settings.tick, settings.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        tick_secs = settings.tick.as_secs(),
        threshold,
        visible,
        "telemetry batcher started"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                return flusher.flush(FlushReason::Teardown);
            }
            changed = visibility.changed(), if signal_open => {
                if changed.is_err() {
                    // Signal source is gone; keep the last known state
                    signal_open = false;
                    continue;
                }
                let now_visible = *visibility.borrow_and_update();
                if now_visible == visible {
                    continue;
                }
                visible = now_visible;
                if visible {
                    ticker.reset();
                } else {
                    flusher.flush(FlushReason::Hidden);
                }
            }
            _ = ticker.tick(), if visible => {
                let units = flusher.buffer.lock().record_unit();
                if units >= threshold {
                    flusher.flush(FlushReason::Threshold);
                }
            }
        }
    }
}
