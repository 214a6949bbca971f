//! Work items and the fixed category table.
//!
//! A [`WorkItem`] is created once, at submission, and never mutated. Its
//! priority and per-phase duration come from the category lookup below:
//!
//! | Category | Repair kind | Priority | Phase length |
//! |----------|-------------|----------|--------------|
//! | A        | mechanical  | High     | 5 units      |
//! | B        | electrical  | Medium   | 3 units      |
//! | C        | bodywork    | Low      | 1 unit       |
//!
//! The length of one unit is the simulation clock scale carried by
//! [`WorkItemFactory`]; the table itself is fixed.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Identifier for a work item.
pub type ItemId = u64;

/// Default length of one simulation time unit.
pub const DEFAULT_TIME_UNIT: Duration = Duration::from_secs(1);

/// Process-wide creation counter used to order items stamped with the same `Instant`.
static ARRIVAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Repair category of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Mechanical repair: most urgent, longest phases.
    A,
    /// Electrical repair.
    B,
    /// Bodywork: least urgent, shortest phases.
    C,
}

/// Queue priority derived from a category. Higher is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Bodywork.
    Low = 1,
    /// Electrical.
    Medium = 2,
    /// Mechanical.
    High = 3,
}

impl Priority {
    /// Numeric priority value (1..=3).
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

impl Category {
    /// All categories, most urgent first.
    pub const ALL: [Self; 3] = [Self::A, Self::B, Self::C];

    /// Queue priority for this category.
    #[must_use]
    pub const fn priority(self) -> Priority {
        match self {
            Self::A => Priority::High,
            Self::B => Priority::Medium,
            Self::C => Priority::Low,
        }
    }

    /// Length of every phase, in simulation time units.
    #[must_use]
    pub const fn phase_units(self) -> u32 {
        match self {
            Self::A => 5,
            Self::B => 3,
            Self::C => 1,
        }
    }

    /// Kind of repair this category stands for.
    #[must_use]
    pub const fn repair_kind(self) -> &'static str {
        match self {
            Self::A => "mechanical",
            Self::B => "electrical",
            Self::C => "bodywork",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        };
        f.write_str(letter)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" | "MECHANICAL" => Ok(Self::A),
            "B" | "ELECTRICAL" => Ok(Self::B),
            "C" | "BODYWORK" => Ok(Self::C),
            other => Err(format!("unknown category `{other}`")),
        }
    }
}

/// One vehicle travelling through the pipeline.
///
/// Fields are private and exposed read-only; ownership of the item moves from
/// queue to stage to queue, so no two stages ever see it at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    id: ItemId,
    category: Category,
    priority: Priority,
    stage_duration: Duration,
    #[serde(skip)]
    arrival: Instant,
    arrival_seq: u64,
}

impl WorkItem {
    /// Create an item using the default one-second time unit.
    #[must_use]
    pub fn new(id: ItemId, category: Category) -> Self {
        WorkItemFactory::default().create(id, category)
    }

    /// Item identifier.
    #[must_use]
    pub const fn id(&self) -> ItemId {
        self.id
    }

    /// Repair category.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Queue priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Time spent in each of the four phases.
    #[must_use]
    pub const fn stage_duration(&self) -> Duration {
        self.stage_duration
    }

    /// Instant the item was created. Reused for ordering at every stage.
    #[must_use]
    pub const fn arrival(&self) -> Instant {
        self.arrival
    }

    /// Creation sequence number, unique across the process.
    #[must_use]
    pub const fn arrival_seq(&self) -> u64 {
        self.arrival_seq
    }
}

/// Builds [`WorkItem`]s for a given simulation clock scale.
#[derive(Debug, Clone, Copy)]
pub struct WorkItemFactory {
    time_unit: Duration,
}

impl WorkItemFactory {
    /// Factory where one phase unit lasts `time_unit`.
    #[must_use]
    pub const fn new(time_unit: Duration) -> Self {
        Self { time_unit }
    }

    /// Length of one phase unit.
    #[must_use]
    pub const fn time_unit(&self) -> Duration {
        self.time_unit
    }

    /// Create an item, stamping its arrival time now.
    #[must_use]
    pub fn create(&self, id: ItemId, category: Category) -> WorkItem {
        WorkItem {
            id,
            category,
            priority: category.priority(),
            stage_duration: self.time_unit * category.phase_units(),
            arrival: Instant::now(),
            arrival_seq: ARRIVAL_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for WorkItemFactory {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_UNIT)
    }
}
