//! Concurrency strategies that drive the four stages.

pub mod fan_out;
pub mod persistent;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{PipelineConfig, Strategy};
use crate::core::{PipelineError, PipelineShared};

pub use fan_out::FanOutDispatch;
pub use persistent::PersistentWorkers;

/// Spawner abstraction for the async runtime that runs per-item tasks.
pub trait Spawn {
    /// Spawn a detached task.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Running strategy of a scheduler.
#[derive(Debug)]
pub enum StrategyHandle {
    /// Strategy P.
    Persistent(PersistentWorkers),
    /// Strategy W.
    FanOut(FanOutDispatch),
}

impl StrategyHandle {
    /// Start the strategy selected by `config` over `shared`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Runtime` if a thread or runtime cannot be created.
    pub fn start(config: &PipelineConfig, shared: Arc<PipelineShared>) -> Result<Self, PipelineError> {
        match config.strategy {
            Strategy::Persistent => PersistentWorkers::spawn(shared).map(Self::Persistent),
            Strategy::FanOut => {
                FanOutDispatch::spawn(shared, config.resolved_worker_threads()).map(Self::FanOut)
            }
        }
    }

    /// Stop the strategy, waiting up to `timeout` per worker.
    /// Shutdown must already be signaled on the shared state.
    pub fn stop(self, timeout: Duration) {
        match self {
            Self::Persistent(workers) => workers.stop(timeout),
            Self::FanOut(dispatch) => dispatch.stop(timeout),
        }
    }
}
