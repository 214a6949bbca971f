//! Core pipeline abstractions: items, stages, queues, pools and scheduling.

pub mod barrier;
pub mod error;
pub mod event_log;
pub mod processor;
pub mod queue;
pub mod resource_pool;
pub mod scheduler;
pub mod stage;
pub mod strategy;
pub mod work_item;

pub use barrier::{CompletionBarrier, PollingCounter, WaitGroup, DEFAULT_POLL_INTERVAL};
pub use error::{AppResult, PipelineError};
pub use event_log::{
    EventKind, EventLog, EventSink, InMemoryEventSink, PipelineEvent, TracingEventSink,
    DEFAULT_EVENT_HISTORY,
};
pub use processor::{BarrierAccounting, PipelineShared, StageProcessor};
pub use queue::{SharedQueue, WorkQueue};
pub use resource_pool::{ResourceKind, ResourcePool};
pub use scheduler::{simulate, PipelineScheduler, RunReport};
pub use stage::{Stage, StageState};
pub use strategy::{FanOutDispatch, PersistentWorkers, Spawn, StrategyHandle};
pub use work_item::{Category, ItemId, Priority, WorkItem, WorkItemFactory, DEFAULT_TIME_UNIT};
