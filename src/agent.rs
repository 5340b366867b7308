use rand::Rng;
use serde::Serialize;

use crate::state::CaseState;
use crate::transitions::StateMachine;
use crate::types::{AgentId, CaseKey, Cohort, Day};

/// One simulated case.
///
/// The successor state is drawn when a state is *entered*, not when it is
/// left: a Crown Court outcome is fixed the day the case goes to trial.
/// Changing that ordering changes the model's statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agent {
    pub id: AgentId,
    pub cohort: Cohort,
    pub initial_state: CaseState,
    pub current_state: CaseState,
    /// `None` once the agent is in a terminal state.
    pub next_state: Option<CaseState>,
    /// Total days sampled for the current state; zero in a terminal state.
    pub sojourn_days: u32,
    pub days_left: u32,
    /// End of the day the current state was entered; the first day spent in
    /// it is the day after.
    pub entered_on: Day,
    /// Day a terminal state was reached.
    pub resolved_on: Option<Day>,
}

impl Agent {
    pub fn new(
        id: AgentId,
        cohort: Cohort,
        state: CaseState,
        machine: &StateMachine,
        rng: &mut impl Rng,
    ) -> Self {
        let mut agent = Agent {
            id,
            cohort,
            initial_state: state,
            current_state: state,
            next_state: None,
            sojourn_days: 0,
            days_left: 0,
            entered_on: cohort.entry_day(),
            resolved_on: None,
        };
        agent.enter(state, cohort.entry_day(), machine, rng);
        agent
    }

    pub fn key(&self) -> CaseKey {
        CaseKey { cohort: self.cohort, id: self.id }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_state.is_none()
    }

    /// Advance by one day. Returns `true` if the agent changed state.
    /// Terminal agents are frozen and never change.
    pub fn tick(&mut self, machine: &StateMachine, rng: &mut impl Rng, day: Day) -> bool {
        let Some(next) = self.next_state else {
            return false;
        };
        debug_assert!(self.days_left >= 1, "active agent with no days left: {self:?}");
        self.days_left -= 1;
        if self.days_left > 0 {
            return false;
        }
        self.enter(next, day, machine, rng);
        true
    }

    /// Sample the sojourn first, then commit to the successor.
    fn enter(&mut self, state: CaseState, day: Day, machine: &StateMachine, rng: &mut impl Rng) {
        self.current_state = state;
        self.entered_on = day;
        if machine.is_terminal(state) {
            self.next_state = None;
            self.sojourn_days = 0;
            self.days_left = 0;
            self.resolved_on = Some(day);
            return;
        }
        let sojourn = machine
            .sample_sojourn(state, rng)
            .unwrap_or_else(|| unreachable!("validated: {state} has a rule but no sojourn"));
        self.sojourn_days = sojourn;
        self.days_left = sojourn;
        self.next_state = machine.next_state(state, rng);
    }

    /// Days ticked in the pipeline until resolution, or until the end of
    /// `as_of` if unresolved.
    pub fn days_in_system(&self, as_of: Day) -> u32 {
        self.resolved_on.unwrap_or(as_of).since(self.cohort.entry_day())
    }
}
