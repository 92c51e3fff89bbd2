//! Checkpoint Scheduler
//!
//! A single named background thread that triggers a checkpoint every interval. The
//! stop signal travels over a channel the loop waits on, so `stop` is observed
//! immediately instead of after the next sleep.

use crate::checkpoint::persister::SaveOutcome;
use crate::error::{ApiError, StorageError};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const THREAD_NAME: &str = "keeper-checkpoint";

/// Something that can be checkpointed on a timer.
pub trait CheckpointTarget: Send + Sync + 'static {
    fn checkpoint(&self) -> SaveOutcome;
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodic checkpoint driver. At most one worker runs per scheduler.
pub struct CheckpointScheduler {
    interval: Duration,
    worker: Mutex<Option<Worker>>,
    ticks: Arc<AtomicU64>,
}

impl CheckpointScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            worker: Mutex::new(None),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Completed ticks since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Start the worker. A second start while running is a lifecycle bug and errors.
    pub fn start(&self, target: Arc<dyn CheckpointTarget>) -> Result<(), ApiError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(ApiError::SchedulerAlreadyRunning);
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = self.interval;
        let ticks = Arc::clone(&self.ticks);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis() as u64, "Checkpoint loop started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            run_tick(target.as_ref());
                            ticks.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Checkpoint loop stopped");
            })
            .map_err(|e| ApiError::StorageError(StorageError::IoError(e)))?;

        *worker = Some(Worker { stop_tx, handle });
        info!(interval_secs = interval.as_secs_f64(), "Checkpoint scheduler started");
        Ok(())
    }

    /// Signal the worker and join it. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let Some(worker) = self.worker.lock().take() else {
            return false;
        };
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            error!("Checkpoint thread panicked during shutdown");
        }
        info!("Checkpoint scheduler stopped");
        true
    }
}

impl Drop for CheckpointScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_tick(target: &dyn CheckpointTarget) {
    match catch_unwind(AssertUnwindSafe(|| target.checkpoint())) {
        Ok(SaveOutcome::Persisted(info)) => {
            debug!(snapshot_id = info.snapshot_id, "Scheduled checkpoint persisted");
        }
        Ok(SaveOutcome::Skipped) => {}
        Ok(SaveOutcome::Fallback(path)) => {
            warn!(path = %path.display(), "Scheduled checkpoint went to emergency file");
        }
        Ok(SaveOutcome::Failed(reason)) => {
            warn!(%reason, "Scheduled checkpoint failed; retrying next tick");
        }
        Err(_) => {
            error!("Scheduled checkpoint panicked; retrying next tick");
        }
    }
}
