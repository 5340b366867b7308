use thiserror::Error;

use crate::state::CaseState;
use crate::types::Day;

/// Fatal configuration errors, raised before a simulation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no sojourn mean configured for {0}")]
    MissingSojourn(CaseState),

    #[error("sojourn mean for {0} must be positive")]
    NonPositiveMean(CaseState),

    #[error("transition rule for {0} has no successors")]
    EmptyRule(CaseState),

    #[error("transition weight {from} -> {to} is negative or not finite ({weight})")]
    NegativeWeight { from: CaseState, to: CaseState, weight: f64 },

    #[error("transition weights for {0} are all zero")]
    ZeroWeights(CaseState),

    #[error("transition weights for {state} sum to {sum}, expected 1")]
    WeightsDoNotSumToOne { state: CaseState, sum: f64 },

    #[error("seed proportion for {state} is negative or not finite ({proportion})")]
    InvalidProportion { state: CaseState, proportion: f64 },

    #[error("arrival rule {field} is out of range ({value})")]
    InvalidArrivalRule { field: &'static str, value: f64 },

    #[error("arrival uplift must be finite and non-negative ({0})")]
    InvalidUplift(f64),

    #[error("intake state {0} has no transition rule")]
    TerminalIntake(CaseState),

    #[error("invalid sojourn distribution for {state}: {source}")]
    Distribution { state: CaseState, source: rand_distr::NormalError },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

/// A trajectory that breaks one of the population invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("day {day}: state counts total {counted}, population is {population}")]
    DayCountMismatch { day: Day, counted: u64, population: u64 },

    #[error("day {day}: population grew by {actual}, expected {expected}")]
    NonMonotonicGrowth { day: Day, expected: u64, actual: i64 },

    #[error("snapshot {index} is labelled day {found}, expected day {expected}")]
    DayGap { index: usize, expected: Day, found: Day },
}
