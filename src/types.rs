use serde::{Deserialize, Serialize};

/// Batch-local agent identifier.
/// Unique only within the cohort that created it: every daily arrival batch
/// restarts at zero, as does every seed state. Use [`CaseKey`] when a
/// population-wide identity is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

/// Simulation time in days (1 unit = 1 simulated day).
/// Day 0 is the seeding instant; the first simulated day is Day(1), so the
/// trajectory entry for day `d` describes the population at the end of `d`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Day(pub u32);

impl Day {
    pub const DAYS_PER_YEAR: u32 = 365;

    pub fn next(self) -> Self {
        Day(self.0 + 1)
    }

    /// Days elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn since(self, earlier: Day) -> u32 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The batch an agent was created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cohort {
    /// Placed directly into a backlog or custody state before day 1.
    Seed,
    /// Arrived into the intake state on the given day.
    Arrival(Day),
}

impl Cohort {
    /// End of the day before the agent's first tick. Arrivals tick on their
    /// arrival day, so they enter at the end of the previous one.
    pub fn entry_day(self) -> Day {
        match self {
            Cohort::Seed => Day(0),
            Cohort::Arrival(day) => Day(day.0.saturating_sub(1)),
        }
    }
}

/// Population-wide identity: the cohort paired with the batch-local id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseKey {
    pub cohort: Cohort,
    pub id: AgentId,
}
