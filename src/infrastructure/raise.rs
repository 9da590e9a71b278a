//! Periodic listing raise.
//!
//! Runs on its own thread and only talks to the marketplace, so it never
//! contends with order handling or the session worker.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::CategoryId;
use crate::port::Marketplace;

/// Handle to a running raise timer. Dropping it stops the timer.
pub struct Raiser {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Raiser {
    /// Raise `categories` now and then every `interval`.
    pub fn spawn(
        market: Arc<dyn Marketplace>,
        categories: Vec<CategoryId>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name("lot-raise".into())
            .spawn(move || {
                info!(interval_secs = interval.as_secs(), categories = ?categories, "Lot raise timer started");
                loop {
                    raise_all(market.as_ref(), &categories);
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("Lot raise timer stopped");
            })?;
        Ok(Self {
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    /// Stop the timer and wait for its thread.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Lot raise thread panicked");
            }
        }
    }
}

impl Drop for Raiser {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Raise every category once; failures are logged and skipped.
pub fn raise_all(market: &dyn Marketplace, categories: &[CategoryId]) {
    for &category in categories {
        match market.raise_lots(category) {
            Ok(()) => debug!(%category, "Lots raised"),
            Err(err) => warn!(%category, error = %err, "Failed to raise lots"),
        }
    }
}
