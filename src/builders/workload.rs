//! Workload generation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::{Category, ItemId, WorkItem, WorkItemFactory};

/// Named category mixes used for strategy comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// 10 A, 10 B, 10 C.
    Balanced,
    /// 20 A, 5 B, 5 C.
    HighPriorityHeavy,
    /// 5 A, 5 B, 20 C.
    LowPriorityHeavy,
}

impl Preset {
    /// Item counts per category, in `A, B, C` order.
    #[must_use]
    pub const fn counts(self) -> [usize; 3] {
        match self {
            Self::Balanced => [10, 10, 10],
            Self::HighPriorityHeavy => [20, 5, 5],
            Self::LowPriorityHeavy => [5, 5, 20],
        }
    }

    /// Builder preloaded with this preset's counts.
    #[must_use]
    pub fn builder(self) -> WorkloadBuilder {
        Category::ALL
            .into_iter()
            .zip(self.counts())
            .fold(WorkloadBuilder::new(), |b, (category, count)| {
                b.with_category(category, count)
            })
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Balanced => f.write_str("balanced"),
            Self::HighPriorityHeavy => f.write_str("high_priority_heavy"),
            Self::LowPriorityHeavy => f.write_str("low_priority_heavy"),
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "balanced" => Ok(Self::Balanced),
            "high_priority_heavy" | "high" => Ok(Self::HighPriorityHeavy),
            "low_priority_heavy" | "low" => Ok(Self::LowPriorityHeavy),
            other => Err(format!("unknown preset `{other}`")),
        }
    }
}

/// Builds a list of work items from per-category counts.
///
/// Ids are assigned sequentially, all A items first, then B, then C.
#[derive(Debug, Clone)]
pub struct WorkloadBuilder {
    counts: BTreeMap<Category, usize>,
    first_id: ItemId,
}

impl WorkloadBuilder {
    /// Empty workload starting at id 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
            first_id: 1,
        }
    }

    /// Set the number of items of `category`.
    #[must_use]
    pub fn with_category(mut self, category: Category, count: usize) -> Self {
        self.counts.insert(category, count);
        self
    }

    /// Set the id of the first item.
    #[must_use]
    pub const fn starting_at(mut self, first_id: ItemId) -> Self {
        self.first_id = first_id;
        self
    }

    /// Total number of items the builder produces.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Create the items, stamping each one's arrival now.
    #[must_use]
    pub fn build(&self, factory: &WorkItemFactory) -> Vec<WorkItem> {
        let mut next_id = self.first_id;
        let mut items = Vec::with_capacity(self.total());
        for (&category, &count) in &self.counts {
            for _ in 0..count {
                items.push(factory.create(next_id, category));
                next_id += 1;
            }
        }
        items
    }
}

impl Default for WorkloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ids_sequential_by_category() {
        let items = WorkloadBuilder::new()
            .with_category(Category::C, 1)
            .with_category(Category::A, 2)
            .build(&WorkItemFactory::new(Duration::from_millis(1)));

        let summary: Vec<_> = items.iter().map(|i| (i.id(), i.category())).collect();
        assert_eq!(
            summary,
            vec![(1, Category::A), (2, Category::A), (3, Category::C)]
        );
    }

    #[test]
    fn test_presets() {
        assert_eq!(Preset::Balanced.builder().total(), 30);
        let items = Preset::HighPriorityHeavy
            .builder()
            .build(&WorkItemFactory::default());
        assert_eq!(items.iter().filter(|i| i.category() == Category::A).count(), 20);
        assert_eq!(Preset::LowPriorityHeavy.counts(), [5, 5, 20]);
    }

    #[test]
    fn test_starting_at_and_zero_counts() {
        let items = WorkloadBuilder::new()
            .with_category(Category::B, 0)
            .with_category(Category::C, 2)
            .starting_at(100)
            .build(&WorkItemFactory::default());
        assert_eq!(items.iter().map(WorkItem::id).collect::<Vec<_>>(), vec![100, 101]);
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!("high-priority-heavy".parse::<Preset>().unwrap(), Preset::HighPriorityHeavy);
        assert_eq!("Balanced".parse::<Preset>().unwrap(), Preset::Balanced);
        assert!("mixed".parse::<Preset>().is_err());
    }
}
