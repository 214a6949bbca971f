//! In-memory stage queue with priority and arrival ordering.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::core::{ItemId, PipelineError, WorkItem, WorkQueue};

/// Wrapper to make `WorkItem` orderable by priority (highest first) and FIFO within priority.
struct RankedItem {
    item: WorkItem,
}

impl PartialEq for RankedItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankedItem {}

impl PartialOrd for RankedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first
        self.item
            .priority()
            .cmp(&other.item.priority())
            // Earlier arrival wins ties (reversed for max-heap)
            .then_with(|| other.item.arrival().cmp(&self.item.arrival()))
            .then_with(|| other.item.arrival_seq().cmp(&self.item.arrival_seq()))
    }
}

/// In-memory queue storing work items in a priority heap.
/// This provides O(log n) push and O(log n) pop.
#[derive(Default)]
pub struct InMemoryQueue {
    items: BinaryHeap<RankedItem>,
    /// Ids currently queued, to reject duplicates.
    queued: HashSet<ItemId>,
}

impl InMemoryQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue with room for `capacity` items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: BinaryHeap::with_capacity(capacity),
            queued: HashSet::with_capacity(capacity),
        }
    }
}

impl WorkQueue for InMemoryQueue {
    fn push(&mut self, item: WorkItem) -> Result<(), PipelineError> {
        if !self.queued.insert(item.id()) {
            return Err(PipelineError::InvariantViolation(format!(
                "item {} queued twice",
                item.id()
            )));
        }
        self.items.push(RankedItem { item });
        Ok(())
    }

    fn pop(&mut self) -> Option<WorkItem> {
        let ranked = self.items.pop()?;
        self.queued.remove(&ranked.item.id());
        Some(ranked.item)
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, WorkItemFactory};
    use std::time::Duration;

    fn factory() -> WorkItemFactory {
        WorkItemFactory::new(Duration::from_millis(1))
    }

    #[test]
    fn test_priority_ordering() {
        let f = factory();
        let mut q = InMemoryQueue::new();

        q.push(f.create(1, Category::C)).unwrap();
        q.push(f.create(2, Category::A)).unwrap();
        q.push(f.create(3, Category::B)).unwrap();

        assert_eq!(q.pop().unwrap().id(), 2); // A
        assert_eq!(q.pop().unwrap().id(), 3); // B
        assert_eq!(q.pop().unwrap().id(), 1); // C
    }

    #[test]
    fn test_earlier_arrival_wins_regardless_of_push_order() {
        let f = factory();
        let first = f.create(1, Category::B);
        std::thread::sleep(Duration::from_millis(2));
        let second = f.create(2, Category::B);
        std::thread::sleep(Duration::from_millis(2));
        let third = f.create(3, Category::B);

        let mut q = InMemoryQueue::new();
        q.push(third).unwrap();
        q.push(first).unwrap();
        q.push(second).unwrap();

        assert_eq!(q.pop().unwrap().id(), 1);
        assert_eq!(q.pop().unwrap().id(), 2);
        assert_eq!(q.pop().unwrap().id(), 3);
    }

    #[test]
    fn test_same_instant_ties_break_by_creation() {
        let f = factory();
        let items: Vec<_> = (1..=5).map(|id| f.create(id, Category::A)).collect();

        let mut q = InMemoryQueue::new();
        for item in items.into_iter().rev() {
            q.push(item).unwrap();
        }

        let popped: Vec<_> = std::iter::from_fn(|| q.pop()).map(|i| i.id()).collect();
        assert_eq!(popped, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_priority_beats_arrival() {
        let f = factory();
        let early_low = f.create(1, Category::C);
        let late_high = f.create(2, Category::A);

        let mut q = InMemoryQueue::new();
        q.push(early_low).unwrap();
        q.push(late_high).unwrap();

        assert_eq!(q.pop().unwrap().id(), 2);
    }

    #[test]
    fn test_duplicate_push_rejected() {
        let f = factory();
        let item = f.create(9, Category::A);
        let mut q = InMemoryQueue::new();
        q.push(item.clone()).unwrap();

        let err = q.push(item).unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation(_)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_item_can_requeue_after_pop() {
        let f = factory();
        let mut q = InMemoryQueue::with_capacity(4);
        q.push(f.create(1, Category::A)).unwrap();
        let item = q.pop().unwrap();
        q.push(item).unwrap();
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_empty_queue() {
        let mut q = InMemoryQueue::new();
        assert!(q.pop().is_none());
        assert_eq!(q.len(), 0);
        assert!(q.is_empty());
    }
}
