use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::error::ConfigError;
use crate::state::{CaseState, StateCounts};
use crate::transitions::StateMachine;
use crate::types::{AgentId, Cohort, Day};

/// Share of the initial caseload placed directly into one state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedShare {
    pub state: CaseState,
    pub proportion: f64,
}

/// Initial population make-up. Shares are seeded in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedComposition(pub Vec<SeedShare>);

impl SeedComposition {
    /// Proportions from raw caseload counts, e.g. published backlog sizes.
    pub fn from_counts(counts: &[(CaseState, u64)]) -> Self {
        let total: u64 = counts.iter().map(|(_, n)| n).sum();
        SeedComposition(
            counts
                .iter()
                .map(|&(state, n)| SeedShare {
                    state,
                    proportion: if total == 0 { 0.0 } else { n as f64 / total as f64 },
                })
                .collect(),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for share in &self.0 {
            if !share.proportion.is_finite() || share.proportion < 0.0 {
                return Err(ConfigError::InvalidProportion {
                    state: share.state,
                    proportion: share.proportion,
                });
            }
        }
        let sum: f64 = self.0.iter().map(|s| s.proportion).sum();
        if (sum - 1.0).abs() > 1e-3 {
            warn!(sum, "seed proportions do not sum to 1; seeded total will differ from requested");
        }
        Ok(())
    }

    /// Agents per state: `round(proportion × total)`. The realized total may
    /// differ slightly from `total`; that is not corrected.
    pub fn allocate(&self, total: u64) -> Vec<(CaseState, u64)> {
        self.0
            .iter()
            .map(|s| (s.state, (s.proportion * total as f64).round_ties_even() as u64))
            .collect()
    }
}

/// Every agent in a run. Agents are never removed.
///
/// Terminal agents never change again, so they are kept apart from the
/// active ones with a running tally of their states; [`Population::tally`]
/// is unaffected by the split.
#[derive(Debug, Clone, Default)]
pub struct Population {
    active: Vec<Agent>,
    terminal: Vec<Agent>,
    terminal_counts: StateCounts,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve room for the largest population a run will reach. Most
    /// agents end up terminal, so that side takes the full budget; the active
    /// side starts at a quarter of it and grows on demand.
    pub fn with_capacity(capacity: usize) -> Self {
        Population {
            active: Vec::with_capacity(capacity / 4),
            terminal: Vec::with_capacity(capacity),
            terminal_counts: StateCounts::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.terminal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.active.iter().chain(self.terminal.iter())
    }

    pub fn into_agents(self) -> Vec<Agent> {
        let mut agents = self.active;
        agents.extend(self.terminal);
        agents
    }

    fn push(&mut self, agent: Agent) {
        if agent.is_terminal() {
            self.terminal_counts.increment(agent.current_state);
            self.terminal.push(agent);
        } else {
            self.active.push(agent);
        }
    }

    /// Create the day-0 caseload directly in its seed states, bypassing the
    /// earlier pipeline stages. Ids restart at zero for each seed state.
    /// Returns the number of agents created.
    pub fn seed_initial_population(
        &mut self,
        total: u64,
        composition: &SeedComposition,
        machine: &StateMachine,
        rng: &mut impl Rng,
    ) -> u64 {
        let mut created = 0;
        for (state, n) in composition.allocate(total) {
            for i in 0..n {
                self.push(Agent::new(AgentId(i), Cohort::Seed, state, machine, rng));
            }
            debug!(%state, agents = n, "seeded initial caseload");
            created += n;
        }
        created
    }

    /// Append `count` new cases in the intake state. Ids are local to this
    /// batch; pair them with the day via [`Agent::key`] for a global identity.
    pub fn add_daily_arrivals(
        &mut self,
        count: u32,
        day: Day,
        machine: &StateMachine,
        rng: &mut impl Rng,
    ) {
        for i in 0..count {
            self.push(Agent::new(
                AgentId(u64::from(i)),
                Cohort::Arrival(day),
                CaseState::INTAKE,
                machine,
                rng,
            ));
        }
    }

    /// Tick every agent once. Returns the number of state changes.
    pub fn advance_one_day(&mut self, machine: &StateMachine, rng: &mut impl Rng, day: Day) -> u64 {
        let mut transitions = 0;
        let mut i = 0;
        while i < self.active.len() {
            if self.active[i].tick(machine, rng, day) {
                transitions += 1;
            }
            if self.active[i].is_terminal() {
                // The swapped-in agent has not ticked yet; revisit slot i.
                let agent = self.active.swap_remove(i);
                self.terminal_counts.increment(agent.current_state);
                self.terminal.push(agent);
            } else {
                i += 1;
            }
        }
        transitions
    }

    /// Agents per state, terminal agents included.
    pub fn tally(&self) -> StateCounts {
        let active: StateCounts = self.active.iter().map(|a| a.current_state).collect();
        active.merged(&self.terminal_counts)
    }
}
