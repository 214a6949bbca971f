//! Stage queue abstraction.

use parking_lot::Mutex;

use crate::core::{PipelineError, Stage, WorkItem};

/// Abstraction for per-stage queue backends.
///
/// Implementations order items by priority (highest first) and, within a
/// priority, by arrival (earliest first).
pub trait WorkQueue: Send {
    /// Insert an item, preserving the ordering invariant.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvariantViolation` if the item is already queued.
    fn push(&mut self, item: WorkItem) -> Result<(), PipelineError>;
    /// Remove and return the highest-ranked item. `None` means no work.
    fn pop(&mut self) -> Option<WorkItem>;
    /// Current depth.
    fn len(&self) -> usize;
    /// Whether the queue holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Queue for one stage, guarded by its own mutex.
///
/// This is the only handle stages use to reach each other: the upstream
/// stage pushes, the owning stage pops.
pub struct SharedQueue {
    stage: Stage,
    inner: Mutex<Box<dyn WorkQueue>>,
}

impl SharedQueue {
    /// Wrap a backend as the queue feeding `stage`.
    #[must_use]
    pub fn new(stage: Stage, backend: Box<dyn WorkQueue>) -> Self {
        Self {
            stage,
            inner: Mutex::new(backend),
        }
    }

    /// Stage this queue feeds.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Push an item into the queue.
    ///
    /// # Errors
    ///
    /// Propagates queue corruption reported by the backend.
    pub fn push(&self, item: WorkItem) -> Result<(), PipelineError> {
        let id = item.id();
        self.inner.lock().push(item)?;
        tracing::trace!(stage = self.stage.name(), item = id, "enqueued");
        Ok(())
    }

    /// Pop the highest-ranked item, if any.
    pub fn pop(&self) -> Option<WorkItem> {
        self.inner.lock().pop()
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl std::fmt::Debug for SharedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedQueue")
            .field("stage", &self.stage)
            .field("len", &self.len())
            .finish()
    }
}
