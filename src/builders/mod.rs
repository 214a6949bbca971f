//! Builders that generate workloads for pipeline runs.

pub mod workload;

pub use workload::{Preset, WorkloadBuilder};
