use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The stages a case passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseState {
    UnderInvestigation,
    Charged,
    /// Awaiting a magistrates' court hearing.
    McBacklog,
    InMc,
    /// Awaiting a Crown Court hearing.
    CcBacklog,
    InCc,
    Convicted,
    Imprisoned,
    Dismissed,
}

impl CaseState {
    pub const COUNT: usize = 9;

    pub const ALL: [CaseState; Self::COUNT] = [
        CaseState::UnderInvestigation,
        CaseState::Charged,
        CaseState::McBacklog,
        CaseState::InMc,
        CaseState::CcBacklog,
        CaseState::InCc,
        CaseState::Convicted,
        CaseState::Imprisoned,
        CaseState::Dismissed,
    ];

    /// Every arrival starts here.
    pub const INTAKE: CaseState = CaseState::UnderInvestigation;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaseState::UnderInvestigation => "UNDER_INVESTIGATION",
            CaseState::Charged => "CHARGED",
            CaseState::McBacklog => "MC_BACKLOG",
            CaseState::InMc => "IN_MC",
            CaseState::CcBacklog => "CC_BACKLOG",
            CaseState::InCc => "IN_CC",
            CaseState::Convicted => "CONVICTED",
            CaseState::Imprisoned => "IMPRISONED",
            CaseState::Dismissed => "DISMISSED",
        }
    }
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown case state '{0}'")]
pub struct UnknownState(pub String);

impl FromStr for CaseState {
    type Err = UnknownState;

    /// Accepts the serialized name in any case, e.g. `CHARGED` or `mc_backlog`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        CaseState::ALL
            .into_iter()
            .find(|state| state.as_str() == upper)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

/// Number of agents occupying each state.
/// Serializes as a `{ "STATE": count }` map with every state present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<CaseState, u64>", from = "BTreeMap<CaseState, u64>")]
pub struct StateCounts([u64; CaseState::COUNT]);

impl StateCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, state: CaseState) {
        self.0[state.index()] += 1;
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CaseState, u64)> + '_ {
        CaseState::ALL.into_iter().map(|s| (s, self.0[s.index()]))
    }

    /// Element-wise sum.
    pub fn merged(mut self, other: &StateCounts) -> Self {
        for (slot, n) in self.0.iter_mut().zip(other.0) {
            *slot += n;
        }
        self
    }
}

impl Index<CaseState> for StateCounts {
    type Output = u64;

    fn index(&self, state: CaseState) -> &u64 {
        &self.0[state.index()]
    }
}

impl IndexMut<CaseState> for StateCounts {
    fn index_mut(&mut self, state: CaseState) -> &mut u64 {
        &mut self.0[state.index()]
    }
}

impl FromIterator<CaseState> for StateCounts {
    fn from_iter<I: IntoIterator<Item = CaseState>>(iter: I) -> Self {
        let mut counts = StateCounts::new();
        for state in iter {
            counts.increment(state);
        }
        counts
    }
}

impl From<StateCounts> for BTreeMap<CaseState, u64> {
    fn from(counts: StateCounts) -> Self {
        counts.iter().collect()
    }
}

impl From<BTreeMap<CaseState, u64>> for StateCounts {
    fn from(map: BTreeMap<CaseState, u64>) -> Self {
        let mut counts = StateCounts::new();
        for (state, n) in map {
            counts[state] = n;
        }
        counts
    }
}
