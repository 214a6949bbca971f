//! Strategy P: one persistent OS thread per stage.
//!
//! Each thread loops over its stage queue. An empty queue is rechecked after
//! the idle backoff; a resource wait blocks the whole stage.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::core::{PipelineError, PipelineShared, Stage, StageProcessor};

/// Handles for the four stage threads.
#[derive(Debug)]
pub struct PersistentWorkers {
    /// Dropping the sender wakes every idle worker.
    stop_tx: Option<Sender<()>>,
    workers: Vec<(Stage, JoinHandle<()>)>,
}

impl PersistentWorkers {
    /// Spawn one named thread per stage.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Runtime` if a thread cannot be spawned.
    pub fn spawn(shared: Arc<PipelineShared>) -> Result<Self, PipelineError> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let mut this = Self {
            stop_tx: Some(stop_tx),
            workers: Vec::with_capacity(Stage::ALL.len()),
        };

        for stage in Stage::ALL {
            let shared = Arc::clone(&shared);
            let stop_rx = stop_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("pipeline-{}", stage.name()))
                .spawn(move || stage_loop(StageProcessor::new(stage), &shared, &stop_rx))
                .map_err(|e| PipelineError::Runtime(format!("failed to spawn {stage} worker: {e}")))?;
            this.workers.push((stage, handle));
        }

        info!(workers = this.workers.len(), "persistent stage workers started");
        Ok(this)
    }

    /// Wake idle workers and join each one, detaching any that miss `timeout`.
    pub fn stop(mut self, timeout: Duration) {
        drop(self.stop_tx.take());

        for (stage, worker) in self.workers.drain(..) {
            let (tx, rx) = bounded(1);
            let joiner = thread::spawn(move || {
                let _ = tx.send(worker.join().is_ok());
            });

            match rx.recv_timeout(timeout) {
                Ok(true) => {
                    debug!(stage = stage.name(), "stage worker joined");
                    let _ = joiner.join();
                }
                Ok(false) => warn!(stage = stage.name(), "stage worker panicked"),
                Err(_) => {
                    warn!(stage = stage.name(), "stage worker did not exit within timeout - detaching");
                }
            }
        }

        info!("persistent stage workers stopped");
    }
}

fn stage_loop(processor: StageProcessor, shared: &PipelineShared, stop_rx: &Receiver<()>) {
    let stage = processor.stage();
    debug!(stage = stage.name(), "stage worker started");

    while !shared.is_shutdown() {
        let Some(item) = processor.dequeue(shared) else {
            processor.idle();
            match stop_rx.recv_timeout(shared.idle_backoff()) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        };

        if let Err(err) = processor.run_blocking(shared, item) {
            shared.fail(stage, err);
            break;
        }
    }

    debug!(stage = stage.name(), "stage worker exiting");
}
