//! Strategy W: one dispatcher per stage, one task per item.
//!
//! Dispatchers run on a runtime owned by the run. Each dequeued item gets
//! its own task, so concurrency inside a stage is bounded only by that
//! stage's resource pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::{PipelineError, PipelineShared, Spawn, Stage, StageProcessor};
use crate::runtime::{build_runtime, TokioSpawner};

/// Runtime and dispatcher handles for a fan-out run.
pub struct FanOutDispatch {
    runtime: Runtime,
    dispatchers: Vec<(Stage, JoinHandle<()>)>,
}

impl FanOutDispatch {
    /// Build the runtime and start one dispatcher per stage.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Runtime` if the runtime cannot be built.
    pub fn spawn(shared: Arc<PipelineShared>, worker_threads: usize) -> Result<Self, PipelineError> {
        let runtime = build_runtime(worker_threads)?;
        let spawner = TokioSpawner::new(runtime.handle().clone());

        let dispatchers = Stage::ALL
            .into_iter()
            .map(|stage| {
                let handle = runtime.spawn(dispatch_loop(
                    StageProcessor::new(stage),
                    Arc::clone(&shared),
                    spawner.clone(),
                ));
                (stage, handle)
            })
            .collect();

        info!(worker_threads, "fan-out dispatchers started");
        Ok(Self { runtime, dispatchers })
    }

    /// Wait for dispatchers to notice shutdown, then tear down the runtime.
    ///
    /// Must not be called from inside an async context.
    pub fn stop(self, timeout: Duration) {
        let Self { runtime, dispatchers } = self;

        runtime.block_on(async {
            for (stage, handle) in dispatchers {
                match tokio::time::timeout(timeout, handle).await {
                    Ok(Ok(())) => debug!(stage = stage.name(), "dispatcher joined"),
                    Ok(Err(e)) => warn!(stage = stage.name(), error = %e, "dispatcher failed"),
                    Err(_) => warn!(stage = stage.name(), "dispatcher did not exit within timeout"),
                }
            }
        });
        runtime.shutdown_timeout(timeout);

        info!("fan-out dispatchers stopped");
    }
}

impl std::fmt::Debug for FanOutDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutDispatch")
            .field("dispatchers", &self.dispatchers.len())
            .finish_non_exhaustive()
    }
}

async fn dispatch_loop<S: Spawn>(processor: StageProcessor, shared: Arc<PipelineShared>, spawner: S) {
    let stage = processor.stage();
    debug!(stage = stage.name(), "dispatcher started");

    while !shared.is_shutdown() {
        let Some(item) = processor.dequeue(&shared) else {
            processor.idle();
            tokio::time::sleep(shared.idle_backoff()).await;
            continue;
        };

        let shared = Arc::clone(&shared);
        spawner.spawn(async move {
            if let Err(err) = processor.run_async(&shared, item).await {
                shared.fail(stage, err);
            }
        });
    }

    debug!(stage = stage.name(), "dispatcher exiting");
}
