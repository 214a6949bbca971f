//! Pipeline scheduler: owns one run end to end.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{PipelineConfig, Strategy};
use crate::core::{
    Category, EventKind, EventSink, ItemId, PipelineError, PipelineEvent, PipelineShared,
    ResourceKind, Stage, StrategyHandle, WorkItem,
};

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// Strategy that drove the stages.
    pub strategy: Strategy,
    /// Wall time from the start of submission until the barrier released.
    pub elapsed: Duration,
    /// Items that left Final Check, in completion order.
    pub completed: Vec<WorkItem>,
    /// Recorded event history, oldest first.
    pub events: Vec<PipelineEvent>,
    /// Most bays held at once.
    pub peak_bays: u32,
    /// Most technicians held at once.
    pub peak_technicians: u32,
}

impl RunReport {
    /// Ids of completed items, in completion order.
    #[must_use]
    pub fn completed_ids(&self) -> Vec<ItemId> {
        self.completed.iter().map(WorkItem::id).collect()
    }

    /// Every `(stage, kind)` pair recorded for `id`, in order.
    #[must_use]
    pub fn stage_trace(&self, id: ItemId) -> Vec<(Stage, EventKind)> {
        self.events
            .iter()
            .filter(|e| e.item_id == id)
            .map(|e| (e.stage, e.kind))
            .collect()
    }

    /// Interval during which `id` was running in `stage`.
    #[must_use]
    pub fn phase_window(&self, id: ItemId, stage: Stage) -> Option<(Duration, Duration)> {
        let at = |kind| {
            self.events
                .iter()
                .find(|e| e.item_id == id && e.stage == stage && e.kind == kind)
                .map(|e| e.elapsed)
        };
        Some((at(EventKind::Running)?, at(EventKind::Completed)?))
    }

    /// Number of completed items per category.
    #[must_use]
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.completed {
            *counts.entry(item.category()).or_insert(0) += 1;
        }
        counts
    }

    /// Serialize the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which does not occur for well-formed reports.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Drives work items through the four stages under one strategy.
///
/// A scheduler runs once. All methods block; none may be called from inside
/// an async runtime.
pub struct PipelineScheduler {
    config: PipelineConfig,
    shared: Arc<PipelineShared>,
    strategy: Option<StrategyHandle>,
    has_run: bool,
}

impl PipelineScheduler {
    /// Validate `config` and build fresh queues, pools and barrier.
    /// No thread or task exists until [`PipelineScheduler::start`].
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::InvalidConfig)?;
        let shared = Arc::new(PipelineShared::new(&config)?);
        Ok(Self {
            config,
            shared,
            strategy: None,
            has_run: false,
        })
    }

    /// Configuration of this scheduler.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Attach an observer that sees every event of the run.
    pub fn add_event_sink(&self, sink: Box<dyn EventSink>) {
        self.shared.events().add_observer(sink);
    }

    /// Spawn the stage workers. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ShutDown` after shutdown, or
    /// `PipelineError::Runtime` if workers cannot be spawned.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.shared.is_shutdown() {
            return Err(PipelineError::ShutDown);
        }
        if self.strategy.is_none() {
            self.strategy = Some(StrategyHandle::start(&self.config, Arc::clone(&self.shared))?);
            info!(
                strategy = %self.config.strategy,
                bays = self.config.bay_capacity,
                technicians = self.config.technician_capacity,
                "pipeline started"
            );
        }
        Ok(())
    }

    /// Place an item in the Admission queue and return immediately.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ShutDown` after shutdown, or
    /// `PipelineError::InvariantViolation` if the id was submitted before.
    pub fn submit(&self, item: WorkItem) -> Result<(), PipelineError> {
        if self.shared.is_shutdown() {
            return Err(PipelineError::ShutDown);
        }
        self.shared.register_submission(item.id())?;
        let barrier = self.shared.barrier();
        barrier.add(1);
        if let Err(err) = self.shared.queue(Stage::Admission).push(item) {
            barrier.done()?;
            return Err(err);
        }
        Ok(())
    }

    /// Submit `items` in shuffled order and block until every submitted item
    /// has left Final Check.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::AlreadyRun` on a second call, or the fatal
    /// error that aborted the run; the scheduler is shut down in that case.
    pub fn run(&mut self, mut items: Vec<WorkItem>) -> Result<RunReport, PipelineError> {
        if self.has_run {
            return Err(PipelineError::AlreadyRun);
        }
        self.has_run = true;
        self.start()?;

        let started = Instant::now();
        let mut rng = self
            .config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        items.shuffle(&mut rng);

        let jitter_ms = self.config.submission_jitter_ms;
        let total = items.len();
        info!(items = total, strategy = %self.config.strategy, "run started");

        for (idx, item) in items.into_iter().enumerate() {
            if let Err(err) = self.submit(item) {
                self.shutdown();
                return Err(err);
            }
            if jitter_ms > 0 && idx + 1 < total {
                std::thread::sleep(Duration::from_millis(rng.random_range(0..=jitter_ms)));
            }
        }

        if let Err(err) = self.shared.barrier().wait() {
            warn!(error = %err, "run aborted");
            self.shutdown();
            return Err(err);
        }

        let report = RunReport {
            run_id: Uuid::new_v4(),
            strategy: self.config.strategy,
            elapsed: started.elapsed(),
            completed: self.shared.completed(),
            events: self.shared.events().history(),
            peak_bays: self.shared.pool(ResourceKind::Bay).peak(),
            peak_technicians: self.shared.pool(ResourceKind::Technician).peak(),
        };
        info!(
            run_id = %report.run_id,
            completed = report.completed.len(),
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "run finished"
        );
        Ok(report)
    }

    /// Stop every loop after its current item. Idempotent.
    ///
    /// Only call once the run has completed; resources held by in-flight
    /// items are not released.
    pub fn shutdown(&mut self) {
        if !self.shared.signal_shutdown() {
            return;
        }
        if let Some(strategy) = self.strategy.take() {
            strategy.stop(self.config.shutdown_timeout());
        }
        info!("pipeline shut down");
    }
}

impl Drop for PipelineScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PipelineScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineScheduler")
            .field("config", &self.config)
            .field("shared", &self.shared)
            .field("strategy", &self.strategy)
            .field("has_run", &self.has_run)
            .finish()
    }
}

/// Run `items` through a fresh pipeline and shut it down.
///
/// # Errors
///
/// Returns `PipelineError::InvalidConfig` for a bad configuration, or the
/// fatal error that aborted the run.
pub fn simulate(items: Vec<WorkItem>, config: &PipelineConfig) -> Result<RunReport, PipelineError> {
    let mut scheduler = PipelineScheduler::new(config.clone())?;
    let report = scheduler.run(items);
    scheduler.shutdown();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorkItemFactory;

    fn fast() -> PipelineConfig {
        PipelineConfig::default()
            .with_time_unit(Duration::from_millis(2))
            .with_idle_backoff(Duration::from_millis(1))
            .with_completion_poll(Duration::from_millis(2))
            .with_submission_jitter(Duration::ZERO)
            .with_seed(1)
    }

    #[test]
    fn test_empty_run_completes() {
        let report = simulate(Vec::new(), &fast()).unwrap();
        assert!(report.completed.is_empty());
        assert!(report.events.is_empty());
    }

    #[test]
    fn test_report_helpers() {
        let f = WorkItemFactory::new(Duration::from_millis(2));
        let items = vec![f.create(1, Category::A), f.create(2, Category::C), f.create(3, Category::C)];
        let report = simulate(items, &fast()).unwrap();

        let counts = report.category_counts();
        assert_eq!(counts.get(&Category::A), Some(&1));
        assert_eq!(counts.get(&Category::C), Some(&2));

        let (start, end) = report.phase_window(1, Stage::Repair).unwrap();
        assert!(end - start >= Duration::from_millis(10));
        assert!(report.phase_window(99, Stage::Repair).is_none());
        assert_eq!(report.stage_trace(2).len(), 12);
    }

    #[test]
    fn test_start_after_shutdown_fails() {
        let mut scheduler = PipelineScheduler::new(fast()).unwrap();
        scheduler.shutdown();
        scheduler.shutdown();
        assert_eq!(scheduler.start(), Err(PipelineError::ShutDown));
    }
}
