//! # Repair Pipeline
//!
//! A priority-aware, four-stage processing pipeline with capacity-limited
//! shared resources, modelled on a vehicle repair workshop.
//!
//! Every vehicle (a [`WorkItem`](core::WorkItem)) passes through
//! Admission, Repair, Cleanup and Final Check, in that order. Two pools bound
//! how much work can proceed at once:
//!
//! - **Bays** are taken at Admission and given back after Final Check.
//! - **Technicians** are held only for the Repair phase.
//!
//! Each stage has its own priority queue: mechanical (A) jobs go ahead of
//! electrical (B), which go ahead of bodywork (C); ties go to the earlier
//! arrival.
//!
//! ## Strategies
//!
//! - **Persistent** runs one OS thread per stage. A stage handles one item at
//!   a time and blocks while waiting for a resource.
//! - **Fan-out** runs one dispatcher per stage on a tokio runtime and spawns a
//!   task per item, so a stage's concurrency is bounded only by its pool.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use repair_pipeline::builders::Preset;
//! use repair_pipeline::config::{PipelineConfig, Strategy};
//! use repair_pipeline::core::{simulate, WorkItemFactory};
//!
//! let config = PipelineConfig::default()
//!     .with_strategy(Strategy::FanOut)
//!     .with_time_unit(Duration::from_millis(100));
//! let items = Preset::Balanced.builder().build(&WorkItemFactory::new(config.time_unit()));
//! let report = simulate(items, &config)?;
//! println!("{} vehicles in {:?}", report.completed.len(), report.elapsed);
//! # Ok::<(), repair_pipeline::core::PipelineError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core pipeline abstractions: items, stages, queues, pools and scheduling.
pub mod core;
/// Configuration models for pipeline runs.
pub mod config;
/// Builders that generate workloads.
pub mod builders;
/// Infrastructure adapters for queue backends.
pub mod infra;
/// Runtime adapters for the fan-out strategy.
pub mod runtime;
/// Shared utilities.
pub mod util;
