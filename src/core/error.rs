//! Error types for pipeline operations.

use thiserror::Error;

/// Errors produced by pipeline components.
///
/// Routine conditions such as an empty stage queue or an exhausted resource
/// pool are never reported through this type; callers wait on those.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Run parameters were rejected before any worker was started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A resource or queue invariant was broken. The run is aborted.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Worker threads or the async runtime could not be started.
    #[error("runtime error: {0}")]
    Runtime(String),
    /// The scheduler no longer accepts work.
    #[error("scheduler has been shut down")]
    ShutDown,
    /// A scheduler drives exactly one run.
    #[error("scheduler already completed a run")]
    AlreadyRun,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
