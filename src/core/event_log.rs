//! Pipeline event log and sink implementations.
//!
//! Every phase of every item produces three events, in order: `Waiting` when
//! the item is dequeued, `Running` once the phase's resource is held, and
//! `Completed` when the phase duration has elapsed.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::{Category, ItemId, Stage, WorkItem};

/// Default number of events kept by the run history.
pub const DEFAULT_EVENT_HISTORY: usize = 100_000;

/// What happened to an item at a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Dequeued; not yet holding the phase's resource.
    Waiting,
    /// Resource held, phase executing.
    Running,
    /// Phase finished.
    Completed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => f.write_str("waiting"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// One observable state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineEvent {
    /// Time since the run started.
    pub elapsed: Duration,
    /// Item the event belongs to.
    pub item_id: ItemId,
    /// Category of the item.
    pub category: Category,
    /// Stage the item is in.
    pub stage: Stage,
    /// Transition observed.
    pub kind: EventKind,
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>8.3}s] vehicle {:>3} (category {}) {:<11} {}",
            self.elapsed.as_secs_f64(),
            self.item_id,
            self.category,
            self.stage.to_string(),
            self.kind
        )
    }
}

/// Event sink abstraction.
pub trait EventSink: Send {
    /// Record an event.
    fn record(&mut self, event: &PipelineEvent);
}

/// In-memory sink with a bounded buffer. Oldest events are dropped first.
#[derive(Debug)]
pub struct InMemoryEventSink {
    events: VecDeque<PipelineEvent>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.iter().cloned().collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&mut self, event: &PipelineEvent) {
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
    }
}

/// Sink that emits one `tracing` info line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&mut self, event: &PipelineEvent) {
        tracing::info!(
            item = event.item_id,
            category = %event.category,
            stage = event.stage.name(),
            kind = %event.kind,
            "{event}"
        );
    }
}

/// Run-wide event log: a bounded history plus caller-attached observers.
pub struct EventLog {
    started: Instant,
    history: Mutex<InMemoryEventSink>,
    observers: Mutex<Vec<Box<dyn EventSink>>>,
}

impl EventLog {
    /// Log keeping up to `max_history` events, clocked from now.
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        Self {
            started: Instant::now(),
            history: Mutex::new(InMemoryEventSink::new(max_history)),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Attach an observer that sees every subsequent event.
    pub fn add_observer(&self, sink: Box<dyn EventSink>) {
        self.observers.lock().push(sink);
    }

    /// Record `kind` for `item` at `stage`.
    pub fn record(&self, item: &WorkItem, stage: Stage, kind: EventKind) {
        // Timestamp under the lock so history is ordered by `elapsed`.
        let event = {
            let mut history = self.history.lock();
            let event = PipelineEvent {
                elapsed: self.started.elapsed(),
                item_id: item.id(),
                category: item.category(),
                stage,
                kind,
            };
            history.record(&event);
            event
        };
        // Observers may block on I/O, so they run outside the history lock.
        for sink in self.observers.lock().iter_mut() {
            sink.record(&event);
        }
    }

    /// Snapshot of the recorded history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<PipelineEvent> {
        self.history.lock().events()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_HISTORY)
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("started", &self.started)
            .field("observers", &self.observers.lock().len())
            .finish_non_exhaustive()
    }
}
