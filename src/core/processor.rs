//! Per-phase processing shared by both strategies.
//!
//! A stage handles one item by walking the state machine
//! `Idle -> Dequeued -> ResourceWait -> Running -> HandOff`. Strategies only
//! decide *who* runs a phase (a persistent thread or a spawned task); the
//! phase itself is always executed by [`StageProcessor`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{PipelineConfig, Strategy};
use crate::core::{
    CompletionBarrier, EventKind, EventLog, ItemId, PipelineError, PollingCounter, ResourceKind,
    ResourcePool, SharedQueue, Stage, StageState, WaitGroup, WorkItem,
};
use crate::infra::queue::memory::InMemoryQueue;

/// How barrier units map onto work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierAccounting {
    /// One unit per item, finished when the item leaves Final Check.
    PerItem,
    /// One unit per phase: added before every push, finished when the phase ends.
    PerPhase,
}

/// State shared by every worker of one run.
pub struct PipelineShared {
    queues: [SharedQueue; 4],
    bays: ResourcePool,
    technicians: ResourcePool,
    events: EventLog,
    barrier: Box<dyn CompletionBarrier>,
    accounting: BarrierAccounting,
    completed: Mutex<Vec<WorkItem>>,
    /// Every id submitted this run, including items already past Admission.
    submitted: Mutex<HashSet<ItemId>>,
    shutdown: AtomicBool,
    idle_backoff: Duration,
}

impl PipelineShared {
    /// Build fresh queues, pools, barrier and event log for `config`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` for a zero capacity.
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let (barrier, accounting) = match config.strategy {
            Strategy::Persistent => (
                Box::new(PollingCounter::new(config.completion_poll())) as Box<dyn CompletionBarrier>,
                BarrierAccounting::PerItem,
            ),
            Strategy::FanOut => (
                Box::new(WaitGroup::new()) as Box<dyn CompletionBarrier>,
                BarrierAccounting::PerPhase,
            ),
        };

        Ok(Self {
            queues: Stage::ALL.map(|stage| SharedQueue::new(stage, Box::new(InMemoryQueue::new()))),
            bays: ResourcePool::new(ResourceKind::Bay, config.bay_capacity)?,
            technicians: ResourcePool::new(ResourceKind::Technician, config.technician_capacity)?,
            events: EventLog::new(config.event_history),
            barrier,
            accounting,
            completed: Mutex::new(Vec::new()),
            submitted: Mutex::new(HashSet::new()),
            shutdown: AtomicBool::new(false),
            idle_backoff: config.idle_backoff(),
        })
    }

    /// Queue feeding `stage`.
    #[must_use]
    pub const fn queue(&self, stage: Stage) -> &SharedQueue {
        &self.queues[stage.index()]
    }

    /// Pool handing out `kind`.
    #[must_use]
    pub const fn pool(&self, kind: ResourceKind) -> &ResourcePool {
        match kind {
            ResourceKind::Bay => &self.bays,
            ResourceKind::Technician => &self.technicians,
        }
    }

    /// Run event log.
    #[must_use]
    pub const fn events(&self) -> &EventLog {
        &self.events
    }

    /// Completion barrier.
    #[must_use]
    pub fn barrier(&self) -> &dyn CompletionBarrier {
        self.barrier.as_ref()
    }

    /// Sleep used when a stage queue is empty.
    #[must_use]
    pub const fn idle_backoff(&self) -> Duration {
        self.idle_backoff
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Request shutdown. Returns `false` if it was already requested.
    pub fn signal_shutdown(&self) -> bool {
        !self.shutdown.swap(true, Ordering::AcqRel)
    }

    /// Claim `id` for this run.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvariantViolation` if `id` was already
    /// submitted, wherever that item is now.
    pub fn register_submission(&self, id: ItemId) -> Result<(), PipelineError> {
        if self.submitted.lock().insert(id) {
            Ok(())
        } else {
            Err(PipelineError::InvariantViolation(format!(
                "item {id} was already submitted to this run"
            )))
        }
    }

    /// Items that left Final Check, in completion order.
    #[must_use]
    pub fn completed(&self) -> Vec<WorkItem> {
        self.completed.lock().clone()
    }

    /// Abort the run with a fatal error.
    pub fn fail(&self, stage: Stage, error: PipelineError) {
        tracing::error!(stage = stage.name(), error = %error, "fatal pipeline error");
        self.barrier.abort(error);
    }
}

impl std::fmt::Debug for PipelineShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineShared")
            .field("queues", &self.queues)
            .field("bays", &self.bays)
            .field("technicians", &self.technicians)
            .field("accounting", &self.accounting)
            .field("outstanding", &self.barrier.outstanding())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

/// Executes the phases of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageProcessor {
    stage: Stage,
}

impl StageProcessor {
    /// Processor for `stage`.
    #[must_use]
    pub const fn new(stage: Stage) -> Self {
        Self { stage }
    }

    /// Stage this processor runs.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    fn transition(&self, item: Option<&WorkItem>, state: StageState) {
        tracing::trace!(
            stage = self.stage.name(),
            item = item.map(WorkItem::id),
            state = ?state,
            "stage transition"
        );
    }

    /// Note that the queue was empty.
    pub fn idle(&self) {
        self.transition(None, StageState::Idle);
    }

    /// Pop the next item and record that it is waiting.
    pub fn dequeue(&self, shared: &PipelineShared) -> Option<WorkItem> {
        let item = shared.queue(self.stage).pop()?;
        self.transition(Some(&item), StageState::Dequeued);
        shared.events().record(&item, self.stage, EventKind::Waiting);
        Some(item)
    }

    fn resource_wait(&self, item: &WorkItem) -> Option<ResourceKind> {
        let kind = self.stage.acquires()?;
        self.transition(Some(item), StageState::ResourceWait);
        tracing::debug!(
            stage = self.stage.name(),
            item = item.id(),
            resource = %kind,
            "waiting for resource"
        );
        Some(kind)
    }

    fn running(&self, shared: &PipelineShared, item: &WorkItem) {
        self.transition(Some(item), StageState::Running);
        shared.events().record(item, self.stage, EventKind::Running);
    }

    /// Block the thread until the phase's resource is held.
    pub fn acquire_blocking(&self, shared: &PipelineShared, item: &WorkItem) {
        if let Some(kind) = self.resource_wait(item) {
            shared.pool(kind).acquire();
        }
        self.running(shared, item);
    }

    /// Suspend the task until the phase's resource is held.
    pub async fn acquire_async(&self, shared: &PipelineShared, item: &WorkItem) {
        if let Some(kind) = self.resource_wait(item) {
            shared.pool(kind).acquire_async().await;
        }
        self.running(shared, item);
    }

    /// Finish the phase: record completion, release resources, forward the
    /// item and settle barrier units.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvariantViolation` on a release without a
    /// matching acquire, a duplicate push or a barrier underflow.
    pub fn hand_off(&self, shared: &PipelineShared, item: WorkItem) -> Result<(), PipelineError> {
        self.transition(Some(&item), StageState::HandOff);
        shared.events().record(&item, self.stage, EventKind::Completed);

        if let Some(kind) = self.stage.releases() {
            shared.pool(kind).release()?;
        }

        match (self.stage.next(), shared.accounting) {
            (Some(next), BarrierAccounting::PerPhase) => {
                shared.barrier().add(1);
                shared.queue(next).push(item)?;
            }
            (Some(next), BarrierAccounting::PerItem) => {
                shared.queue(next).push(item)?;
            }
            (None, _) => {
                tracing::debug!(item = item.id(), category = %item.category(), "item finished");
                shared.completed.lock().push(item);
                if shared.accounting == BarrierAccounting::PerItem {
                    shared.barrier().done()?;
                }
            }
        }

        if shared.accounting == BarrierAccounting::PerPhase {
            shared.barrier().done()?;
        }
        Ok(())
    }

    /// Run a dequeued item's phase on the current thread.
    ///
    /// # Errors
    ///
    /// Propagates [`StageProcessor::hand_off`] failures.
    pub fn run_blocking(&self, shared: &PipelineShared, item: WorkItem) -> Result<(), PipelineError> {
        self.acquire_blocking(shared, &item);
        std::thread::sleep(item.stage_duration());
        self.hand_off(shared, item)
    }

    /// Run a dequeued item's phase inside a task.
    ///
    /// # Errors
    ///
    /// Propagates [`StageProcessor::hand_off`] failures.
    pub async fn run_async(&self, shared: &PipelineShared, item: WorkItem) -> Result<(), PipelineError> {
        self.acquire_async(shared, &item).await;
        tokio::time::sleep(item.stage_duration()).await;
        self.hand_off(shared, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, WorkItemFactory};

    fn config(strategy: Strategy) -> PipelineConfig {
        PipelineConfig::default()
            .with_strategy(strategy)
            .with_bay_capacity(1)
            .with_technician_capacity(1)
    }

    fn item(id: u64) -> WorkItem {
        WorkItemFactory::new(Duration::from_millis(1)).create(id, Category::C)
    }

    #[test]
    fn test_full_chain_on_one_thread_per_item() {
        let shared = PipelineShared::new(&config(Strategy::Persistent)).unwrap();
        shared.barrier().add(1);
        shared.queue(Stage::Admission).push(item(1)).unwrap();

        for stage in Stage::ALL {
            let processor = StageProcessor::new(stage);
            let next = processor.dequeue(&shared).unwrap();
            processor.run_blocking(&shared, next).unwrap();
        }

        assert_eq!(shared.barrier().outstanding(), 0);
        assert_eq!(shared.pool(ResourceKind::Bay).held(), 0);
        assert_eq!(shared.pool(ResourceKind::Technician).held(), 0);
        assert_eq!(shared.completed().len(), 1);
        assert_eq!(shared.events().history().len(), 12);
    }

    #[test]
    fn test_per_phase_accounting_adds_before_push() {
        let shared = PipelineShared::new(&config(Strategy::FanOut)).unwrap();
        shared.barrier().add(1);
        shared.queue(Stage::Admission).push(item(1)).unwrap();

        let admission = StageProcessor::new(Stage::Admission);
        let next = admission.dequeue(&shared).unwrap();
        admission.run_blocking(&shared, next).unwrap();

        // Admission's unit is settled and Repair's is registered.
        assert_eq!(shared.barrier().outstanding(), 1);
        assert_eq!(shared.queue(Stage::Repair).len(), 1);
        assert_eq!(shared.pool(ResourceKind::Bay).held(), 1);
    }

    #[test]
    fn test_release_without_acquire_is_fatal() {
        let shared = PipelineShared::new(&config(Strategy::Persistent)).unwrap();
        shared.barrier().add(1);
        let err = StageProcessor::new(Stage::FinalCheck)
            .hand_off(&shared, item(3))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation(_)));
    }

    #[test]
    fn test_fail_releases_barrier_waiter() {
        let shared = PipelineShared::new(&config(Strategy::FanOut)).unwrap();
        shared.barrier().add(1);
        shared.fail(Stage::Repair, PipelineError::InvariantViolation("boom".into()));
        assert!(shared.barrier().wait().is_err());
    }

    #[test]
    fn test_repair_dequeues_high_priority_first() {
        let shared = PipelineShared::new(&config(Strategy::FanOut)).unwrap();
        let factory = WorkItemFactory::new(Duration::from_millis(1));
        shared.queue(Stage::Repair).push(factory.create(1, Category::C)).unwrap();
        shared.queue(Stage::Repair).push(factory.create(2, Category::A)).unwrap();

        let repair = StageProcessor::new(Stage::Repair);
        let first = repair.dequeue(&shared).unwrap();
        assert_eq!(first.id(), 2);
        assert_eq!(first.category(), Category::A);
        assert_eq!(repair.dequeue(&shared).unwrap().id(), 1);
    }

    #[test]
    fn test_submission_ids_claimed_once_per_run() {
        let shared = PipelineShared::new(&config(Strategy::Persistent)).unwrap();
        shared.register_submission(5).unwrap();
        shared.register_submission(6).unwrap();
        let err = shared.register_submission(5).unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation(_)));
    }

    #[test]
    fn test_signal_shutdown_once() {
        let shared = PipelineShared::new(&config(Strategy::Persistent)).unwrap();
        assert!(!shared.is_shutdown());
        assert!(shared.signal_shutdown());
        assert!(!shared.signal_shutdown());
        assert!(shared.is_shutdown());
    }
}
