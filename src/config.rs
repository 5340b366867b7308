use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::population::SeedComposition;
use crate::state::CaseState;
use crate::transitions::{self, StateMachine, TransitionRule};
use crate::types::Day;

/// Published caseload at the start of the reference period.
const MC_BACKLOG_CASES: u64 = 337_632;
const CC_BACKLOG_CASES: u64 = 62_207;
const PRISON_POPULATION: u64 = 87_869;

/// Annual case intake against the caseload it was measured alongside.
const ANNUAL_INTAKE: f64 = 6_657_518.0;
const REFERENCE_CASELOAD: f64 = 487_708.0;

/// Tolerance for the weights of a probabilistic transition summing to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-5;

/// How many new cases enter investigation each day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArrivalRule {
    Fixed { per_day: u32 },
    /// Scale an observed annual intake to the simulated caseload:
    /// `round(annual_intake / reference_caseload × initial_cases / 365)`.
    Proportional { annual_intake: f64, reference_caseload: f64 },
}

impl ArrivalRule {
    pub fn daily_count(&self, initial_cases: u64) -> u32 {
        match *self {
            ArrivalRule::Fixed { per_day } => per_day,
            ArrivalRule::Proportional { annual_intake, reference_caseload } => {
                proportional_daily(annual_intake, reference_caseload, initial_cases) as u32
            }
        }
    }

    /// Proportional parameters must give a finite daily count that fits a `u32`.
    pub fn validate(&self, initial_cases: u64) -> Result<(), ConfigError> {
        let ArrivalRule::Proportional { annual_intake, reference_caseload } = *self else {
            return Ok(());
        };
        if !annual_intake.is_finite() || annual_intake < 0.0 {
            return Err(ConfigError::InvalidArrivalRule {
                field: "annual_intake",
                value: annual_intake,
            });
        }
        if !reference_caseload.is_finite() || reference_caseload <= 0.0 {
            return Err(ConfigError::InvalidArrivalRule {
                field: "reference_caseload",
                value: reference_caseload,
            });
        }
        let daily = proportional_daily(annual_intake, reference_caseload, initial_cases);
        if daily > f64::from(u32::MAX) {
            return Err(ConfigError::InvalidArrivalRule { field: "daily count", value: daily });
        }
        Ok(())
    }
}

fn proportional_daily(annual_intake: f64, reference_caseload: f64, initial_cases: u64) -> f64 {
    let per_case = annual_intake / reference_caseload;
    (per_case * initial_cases as f64 / f64::from(Day::DAYS_PER_YEAR)).round_ties_even()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub from: CaseState,
    #[serde(flatten)]
    pub rule: TransitionRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SojournEntry {
    pub state: CaseState,
    pub mean_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    pub seed: u64,
    pub initial_cases: u64,
    pub days: u32,
    pub arrivals: ArrivalRule,
    pub seed_composition: SeedComposition,
    pub transitions: Vec<TransitionEntry>,
    pub sojourn: Vec<SojournEntry>,
}

impl SimulationConfig {
    /// The reference run: 10,000 existing cases over two financial years.
    pub fn canonical() -> Self {
        SimulationConfig {
            seed: 42,
            initial_cases: 10_000,
            days: 2 * Day::DAYS_PER_YEAR,
            arrivals: ArrivalRule::Proportional {
                annual_intake: ANNUAL_INTAKE,
                reference_caseload: REFERENCE_CASELOAD,
            },
            seed_composition: SeedComposition::from_counts(&[
                (CaseState::McBacklog, MC_BACKLOG_CASES),
                (CaseState::CcBacklog, CC_BACKLOG_CASES),
                (CaseState::Imprisoned, PRISON_POPULATION),
            ]),
            transitions: transitions::canonical_rules()
                .into_iter()
                .map(|(from, rule)| TransitionEntry { from, rule })
                .collect(),
            sojourn: transitions::canonical_sojourn_means()
                .into_iter()
                .map(|(state, mean_days)| SojournEntry { state, mean_days })
                .collect(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Sanity checks on top of what [`StateMachine::new`] enforces: weighted
    /// transitions must sum to one and the arrival rule must be usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arrivals.validate(self.initial_cases)?;
        for entry in &self.transitions {
            let sum = entry.rule.weight_sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(ConfigError::WeightsDoNotSumToOne { state: entry.from, sum });
            }
        }
        self.seed_composition.validate()?;
        self.state_machine().map(|_| ())
    }

    pub fn state_machine(&self) -> Result<StateMachine, ConfigError> {
        StateMachine::new(
            self.transitions.iter().map(|e| (e.from, e.rule.clone())),
            self.sojourn.iter().map(|s| (s.state, s.mean_days)),
        )
    }

    pub fn daily_arrivals(&self) -> u32 {
        self.arrivals.daily_count(self.initial_cases)
    }

    /// Upper bound on the population size a run reaches on its last day.
    pub fn max_population(&self) -> u64 {
        let seeded: u64 = self.seed_composition.allocate(self.initial_cases).iter().map(|(_, n)| n).sum();
        seeded + u64::from(self.days) * u64::from(self.daily_arrivals())
    }
}

/// A what-if variant of a baseline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Multiplier on the baseline daily arrival count.
    pub arrival_uplift: f64,
}

impl Scenario {
    pub fn new(name: impl Into<String>, arrival_uplift: f64) -> Result<Self, ConfigError> {
        let scenario = Scenario { name: name.into(), arrival_uplift };
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn baseline() -> Self {
        Scenario { name: "baseline".to_string(), arrival_uplift: 1.0 }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.arrival_uplift.is_finite() || self.arrival_uplift < 0.0 {
            return Err(ConfigError::InvalidUplift(self.arrival_uplift));
        }
        Ok(())
    }

    /// `round(baseline_daily × arrival_uplift)`, saturating at `u32::MAX`.
    pub fn daily_arrivals(&self, baseline_daily: u32) -> u32 {
        (f64::from(baseline_daily) * self.arrival_uplift).round_ties_even() as u32
    }
}
