//! Runtime adapters for the fan-out strategy.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;

use tokio::runtime::Runtime;

use crate::core::PipelineError;

/// Build a multi-threaded runtime with `worker_threads` workers.
///
/// # Errors
///
/// Returns `PipelineError::Runtime` if the runtime cannot be created.
pub fn build_runtime(worker_threads: usize) -> Result<Runtime, PipelineError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads.max(1))
        .thread_name("pipeline-fan-out")
        .enable_all()
        .build()
        .map_err(|e| PipelineError::Runtime(format!("failed to build runtime: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_runtime_runs_futures() {
        let runtime = build_runtime(2).unwrap();
        let value = runtime.block_on(async { tokio::task::spawn(async { 21 * 2 }).await.unwrap() });
        assert_eq!(value, 42);
    }
}
