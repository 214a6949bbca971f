//! Configuration models for pipeline runs.

pub mod pipeline;

pub use pipeline::{PipelineConfig, Strategy, ENV_PREFIX};
