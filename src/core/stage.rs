//! Pipeline stages and the per-stage processing states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::ResourceKind;

/// One of the four fixed pipeline phases, in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Vehicle is checked in and takes a bay.
    Admission,
    /// Technician works on the vehicle.
    Repair,
    /// Vehicle is cleaned.
    Cleanup,
    /// Last inspection; the bay is freed afterwards.
    FinalCheck,
}

impl Stage {
    /// All stages in traversal order.
    pub const ALL: [Self; 4] = [Self::Admission, Self::Repair, Self::Cleanup, Self::FinalCheck];

    /// Position of the stage in [`Stage::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Admission => 0,
            Self::Repair => 1,
            Self::Cleanup => 2,
            Self::FinalCheck => 3,
        }
    }

    /// Stage an item moves to after this one, `None` for the terminal stage.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Admission => Some(Self::Repair),
            Self::Repair => Some(Self::Cleanup),
            Self::Cleanup => Some(Self::FinalCheck),
            Self::FinalCheck => None,
        }
    }

    /// Resource that must be acquired before the phase runs.
    #[must_use]
    pub const fn acquires(self) -> Option<ResourceKind> {
        match self {
            Self::Admission => Some(ResourceKind::Bay),
            Self::Repair => Some(ResourceKind::Technician),
            Self::Cleanup | Self::FinalCheck => None,
        }
    }

    /// Resource given back once the phase finishes.
    #[must_use]
    pub const fn releases(self) -> Option<ResourceKind> {
        match self {
            Self::Repair => Some(ResourceKind::Technician),
            Self::FinalCheck => Some(ResourceKind::Bay),
            Self::Admission | Self::Cleanup => None,
        }
    }

    /// Short machine name, used for thread names and log fields.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Admission => "admission",
            Self::Repair => "repair",
            Self::Cleanup => "cleanup",
            Self::FinalCheck => "final_check",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Admission => "Admission",
            Self::Repair => "Repair",
            Self::Cleanup => "Cleanup",
            Self::FinalCheck => "Final Check",
        };
        f.write_str(label)
    }
}

/// States a stage passes through while handling one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageState {
    /// Queue observed empty; backing off before the next check.
    Idle,
    /// Holding an item, about to look for its resource.
    Dequeued,
    /// Blocked on the bay or technician pool.
    ResourceWait,
    /// Executing for the item's stage duration.
    Running,
    /// Pushing to the next queue, or finishing the item.
    HandOff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_chain_visits_every_stage_once() {
        let mut visited = vec![Stage::Admission];
        let mut current = Stage::Admission;
        while let Some(next) = current.next() {
            visited.push(next);
            current = next;
        }
        assert_eq!(visited, Stage::ALL.to_vec());
    }

    #[test]
    fn test_resource_pairing() {
        assert_eq!(Stage::Admission.acquires(), Some(ResourceKind::Bay));
        assert_eq!(Stage::FinalCheck.releases(), Some(ResourceKind::Bay));
        assert_eq!(Stage::Repair.acquires(), Some(ResourceKind::Technician));
        assert_eq!(Stage::Repair.releases(), Some(ResourceKind::Technician));
        assert_eq!(Stage::Cleanup.acquires(), None);
        assert_eq!(Stage::Cleanup.releases(), None);
    }

    #[test]
    fn test_index_matches_order() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }
}
