//! The case state machine: where each state leads and how long cases stay.
//!
//! Both tables are validated once, in [`StateMachine::new`]. After that every
//! lookup is infallible and draws only from the caller's random source.

use rand::Rng;
use rand::distr::weighted::WeightedIndex;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::state::CaseState;

/// One weighted successor of a probabilistic transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub to: CaseState,
    pub weight: f64,
}

/// Where a case goes once its sojourn in a state ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionRule {
    Fixed(CaseState),
    /// Weights are used as given; they are not renormalized.
    Weighted(Vec<Branch>),
}

impl TransitionRule {
    pub fn weighted(branches: &[(CaseState, f64)]) -> Self {
        TransitionRule::Weighted(
            branches.iter().map(|&(to, weight)| Branch { to, weight }).collect(),
        )
    }

    pub fn successors(&self) -> Vec<CaseState> {
        match self {
            TransitionRule::Fixed(to) => vec![*to],
            TransitionRule::Weighted(branches) => branches.iter().map(|b| b.to).collect(),
        }
    }

    pub fn weight_sum(&self) -> f64 {
        match self {
            TransitionRule::Fixed(_) => 1.0,
            TransitionRule::Weighted(branches) => branches.iter().map(|b| b.weight).sum(),
        }
    }
}

/// Sojourn time in days: `round(Normal(mean, mean / 3))`, never below one day.
#[derive(Debug, Clone)]
pub struct SojournModel {
    mean_days: u32,
    normal: Normal<f64>,
}

impl SojournModel {
    pub fn new(state: CaseState, mean_days: u32) -> Result<Self, ConfigError> {
        if mean_days == 0 {
            return Err(ConfigError::NonPositiveMean(state));
        }
        let mean = f64::from(mean_days);
        let normal = Normal::new(mean, mean / 3.0)
            .map_err(|source| ConfigError::Distribution { state, source })?;
        Ok(SojournModel { mean_days, normal })
    }

    pub fn mean_days(&self) -> u32 {
        self.mean_days
    }

    pub fn sample(&self, rng: &mut impl Rng) -> u32 {
        let days = self.normal.sample(rng).round_ties_even();
        if days <= 1.0 { 1 } else { days as u32 }
    }
}

/// A validated transition rule, ready to sample.
#[derive(Debug, Clone)]
enum Successor {
    Fixed(CaseState),
    Weighted { states: Vec<CaseState>, index: WeightedIndex<f64> },
}

impl Successor {
    fn compile(from: CaseState, rule: &TransitionRule) -> Result<Self, ConfigError> {
        let branches = match rule {
            TransitionRule::Fixed(to) => return Ok(Successor::Fixed(*to)),
            TransitionRule::Weighted(branches) => branches,
        };
        if branches.is_empty() {
            return Err(ConfigError::EmptyRule(from));
        }
        if let Some(bad) = branches.iter().find(|b| !b.weight.is_finite() || b.weight < 0.0) {
            return Err(ConfigError::NegativeWeight { from, to: bad.to, weight: bad.weight });
        }
        if branches.iter().all(|b| b.weight == 0.0) {
            return Err(ConfigError::ZeroWeights(from));
        }
        // A single live branch is deterministic; skip the weighted draw.
        let live: Vec<&Branch> = branches.iter().filter(|b| b.weight > 0.0).collect();
        if let [only] = live.as_slice() {
            return Ok(Successor::Fixed(only.to));
        }
        let index = WeightedIndex::new(branches.iter().map(|b| b.weight))
            .map_err(|_| ConfigError::ZeroWeights(from))?;
        Ok(Successor::Weighted { states: branches.iter().map(|b| b.to).collect(), index })
    }

    fn sample(&self, rng: &mut impl Rng) -> CaseState {
        match self {
            Successor::Fixed(to) => *to,
            Successor::Weighted { states, index } => states[index.sample(rng)],
        }
    }
}

/// Transition and sojourn tables for every case state.
///
/// A state without a transition rule is terminal: cases that reach it stay
/// there. Every non-terminal state needs a sojourn mean; a mean configured
/// for a terminal state is accepted and never sampled.
#[derive(Debug, Clone)]
pub struct StateMachine {
    rules: [Option<Successor>; CaseState::COUNT],
    sojourns: [Option<SojournModel>; CaseState::COUNT],
}

impl StateMachine {
    pub fn new(
        rules: impl IntoIterator<Item = (CaseState, TransitionRule)>,
        sojourn_means: impl IntoIterator<Item = (CaseState, u32)>,
    ) -> Result<Self, ConfigError> {
        let mut compiled: [Option<Successor>; CaseState::COUNT] = std::array::from_fn(|_| None);
        for (from, rule) in rules {
            compiled[from.index()] = Some(Successor::compile(from, &rule)?);
        }

        let mut sojourns: [Option<SojournModel>; CaseState::COUNT] =
            std::array::from_fn(|_| None);
        for (state, mean) in sojourn_means {
            sojourns[state.index()] = Some(SojournModel::new(state, mean)?);
        }

        for state in CaseState::ALL {
            if compiled[state.index()].is_some() && sojourns[state.index()].is_none() {
                return Err(ConfigError::MissingSojourn(state));
            }
        }
        if compiled[CaseState::INTAKE.index()].is_none() {
            return Err(ConfigError::TerminalIntake(CaseState::INTAKE));
        }

        Ok(StateMachine { rules: compiled, sojourns })
    }

    /// The reference pipeline calibration.
    pub fn canonical() -> Self {
        StateMachine::new(canonical_rules(), canonical_sojourn_means())
            .expect("canonical state machine tables are valid")
    }

    pub fn is_terminal(&self, state: CaseState) -> bool {
        self.rules[state.index()].is_none()
    }

    /// Draw the successor of `current`. `None` for terminal states.
    pub fn next_state(&self, current: CaseState, rng: &mut impl Rng) -> Option<CaseState> {
        self.rules[current.index()].as_ref().map(|rule| rule.sample(rng))
    }

    /// Draw a sojourn (≥ 1 day) for `state`. `None` when no mean is
    /// configured, which validation only allows for terminal states.
    pub fn sample_sojourn(&self, state: CaseState, rng: &mut impl Rng) -> Option<u32> {
        self.sojourns[state.index()].as_ref().map(|model| model.sample(rng))
    }

    pub fn mean_sojourn(&self, state: CaseState) -> Option<u32> {
        self.sojourns[state.index()].as_ref().map(SojournModel::mean_days)
    }
}

/// Reference transition table.
pub fn canonical_rules() -> Vec<(CaseState, TransitionRule)> {
    use CaseState::*;
    vec![
        (UnderInvestigation, TransitionRule::weighted(&[(Charged, 0.19), (Dismissed, 0.81)])),
        (Charged, TransitionRule::Fixed(McBacklog)),
        (McBacklog, TransitionRule::Fixed(InMc)),
        (
            InMc,
            TransitionRule::weighted(&[(CcBacklog, 0.04), (Convicted, 0.85), (Dismissed, 0.11)]),
        ),
        (CcBacklog, TransitionRule::Fixed(InCc)),
        (InCc, TransitionRule::weighted(&[(Convicted, 0.91), (Dismissed, 0.09)])),
        (Convicted, TransitionRule::Fixed(Imprisoned)),
        (Imprisoned, TransitionRule::Fixed(Dismissed)),
    ]
}

/// Reference mean sojourns in days. DISMISSED is terminal; its very large
/// mean is kept for configurations that give it a rule.
pub fn canonical_sojourn_means() -> Vec<(CaseState, u32)> {
    use CaseState::*;
    vec![
        (UnderInvestigation, 30),
        (Charged, 1),
        (McBacklog, 36),
        (InMc, 19),
        (CcBacklog, 353),
        (InCc, 164),
        (Convicted, 1),
        (Imprisoned, 18),
        (Dismissed, 999_999),
    ]
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    #[test]
    fn charged_always_goes_to_mc_backlog() {
        let machine = StateMachine::canonical();
        let mut rng = rng();
        for _ in 0..1_000 {
            assert_eq!(
                machine.next_state(CaseState::Charged, &mut rng),
                Some(CaseState::McBacklog)
            );
        }
    }

    /// 10k draws from IN_MC must match the configured weights within ±2 %.
    #[test]
    fn in_mc_outcomes_match_weights() {
        let machine = StateMachine::canonical();
        let mut rng = rng();
        let n = 10_000;
        let mut counts = std::collections::HashMap::new();
        for _ in 0..n {
            let next = machine.next_state(CaseState::InMc, &mut rng).unwrap();
            *counts.entry(next).or_insert(0u32) += 1;
        }
        for (state, weight) in
            [(CaseState::CcBacklog, 0.04), (CaseState::Convicted, 0.85), (CaseState::Dismissed, 0.11)]
        {
            let freq = f64::from(counts.get(&state).copied().unwrap_or(0)) / n as f64;
            assert!(
                (freq - weight).abs() <= 0.02,
                "{state}: empirical {freq:.4} vs configured {weight}"
            );
        }
        assert_eq!(counts.len(), 3, "unexpected successor in {counts:?}");
    }

    #[test]
    fn successors_stay_within_configured_branches() {
        let machine = StateMachine::canonical();
        let mut rng = rng();
        for (from, rule) in canonical_rules() {
            let allowed = rule.successors();
            for _ in 0..500 {
                let next = machine.next_state(from, &mut rng).expect("non-terminal");
                assert!(allowed.contains(&next), "{from} -> {next} not in {allowed:?}");
            }
        }
    }

    #[test]
    fn dismissed_is_terminal() {
        let machine = StateMachine::canonical();
        assert!(machine.is_terminal(CaseState::Dismissed));
        assert_eq!(machine.next_state(CaseState::Dismissed, &mut rng()), None);
        assert!(!machine.is_terminal(CaseState::Imprisoned));
        // Configured but never sampled.
        assert_eq!(machine.mean_sojourn(CaseState::Dismissed), Some(999_999));
    }

    #[test]
    fn canonical_weights_sum_to_one() {
        for (from, rule) in canonical_rules() {
            assert!((rule.weight_sum() - 1.0).abs() < 1e-9, "{from}: {}", rule.weight_sum());
        }
    }

    /// Mean of many sojourn draws tracks the configured mean (the floor only
    /// bites three standard deviations below it).
    #[test]
    fn sojourn_mean_in_expected_range() {
        let model = SojournModel::new(CaseState::McBacklog, 36).unwrap();
        let mut rng = rng();
        let n = 10_000;
        let mean = (0..n).map(|_| f64::from(model.sample(&mut rng))).sum::<f64>() / n as f64;
        assert!((35.0..=37.0).contains(&mean), "mean sojourn {mean:.2} outside [35, 37]");
    }

    #[test]
    fn one_day_mean_is_mostly_one_day() {
        let model = SojournModel::new(CaseState::Charged, 1).unwrap();
        let mut rng = rng();
        assert!((0..1_000).all(|_| model.sample(&mut rng) >= 1));
    }

    #[test]
    fn zero_mean_rejected() {
        assert!(matches!(
            SojournModel::new(CaseState::InMc, 0),
            Err(ConfigError::NonPositiveMean(CaseState::InMc))
        ));
    }

    #[test]
    fn negative_weight_rejected() {
        let rules = vec![(
            CaseState::UnderInvestigation,
            TransitionRule::weighted(&[(CaseState::Charged, 1.2), (CaseState::Dismissed, -0.2)]),
        )];
        let err = StateMachine::new(rules, canonical_sojourn_means()).unwrap_err();
        assert!(matches!(err, ConfigError::NegativeWeight { to: CaseState::Dismissed, .. }));
    }

    #[test]
    fn all_zero_weights_rejected() {
        let rules = vec![(
            CaseState::UnderInvestigation,
            TransitionRule::weighted(&[(CaseState::Charged, 0.0), (CaseState::Dismissed, 0.0)]),
        )];
        let err = StateMachine::new(rules, canonical_sojourn_means()).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroWeights(CaseState::UnderInvestigation)));
    }

    #[test]
    fn empty_weighted_rule_rejected() {
        let rules = vec![(CaseState::UnderInvestigation, TransitionRule::Weighted(vec![]))];
        let err = StateMachine::new(rules, canonical_sojourn_means()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRule(CaseState::UnderInvestigation)));
    }

    #[test]
    fn rule_without_sojourn_rejected() {
        let means = vec![(CaseState::UnderInvestigation, 30)];
        let err = StateMachine::new(canonical_rules(), means).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSojourn(CaseState::Charged)));
    }

    #[test]
    fn terminal_intake_rejected() {
        let rules = vec![(CaseState::Charged, TransitionRule::Fixed(CaseState::Dismissed))];
        let err = StateMachine::new(rules, canonical_sojourn_means()).unwrap_err();
        assert!(matches!(err, ConfigError::TerminalIntake(_)));
    }

    #[test]
    fn single_live_branch_is_deterministic() {
        let rules = vec![(
            CaseState::UnderInvestigation,
            TransitionRule::weighted(&[(CaseState::Charged, 0.0), (CaseState::Dismissed, 0.7)]),
        )];
        let machine = StateMachine::new(rules, canonical_sojourn_means()).unwrap();
        let mut rng = rng();
        for _ in 0..100 {
            assert_eq!(
                machine.next_state(CaseState::UnderInvestigation, &mut rng),
                Some(CaseState::Dismissed)
            );
        }
    }

    proptest! {
        #[test]
        fn sojourn_never_below_one_day(mean in 1u32..2_000_000, seed in any::<u64>()) {
            let model = SojournModel::new(CaseState::InCc, mean).unwrap();
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            for _ in 0..32 {
                prop_assert!(model.sample(&mut rng) >= 1);
            }
        }

        #[test]
        fn weighted_draws_land_on_positive_branches(
            weights in prop::collection::vec(0.0f64..10.0, 2..5),
            seed in any::<u64>(),
        ) {
            prop_assume!(weights.iter().any(|&w| w > 0.0));
            let targets = [CaseState::Charged, CaseState::Dismissed, CaseState::InMc, CaseState::Convicted];
            let branches: Vec<(CaseState, f64)> =
                targets.iter().copied().zip(weights.iter().copied()).collect();
            let rules = vec![(CaseState::UnderInvestigation, TransitionRule::weighted(&branches))];
            let machine = StateMachine::new(rules, canonical_sojourn_means()).unwrap();
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            for _ in 0..64 {
                let next = machine.next_state(CaseState::UnderInvestigation, &mut rng).unwrap();
                let weight = branches.iter().find(|(s, _)| *s == next).map(|(_, w)| *w);
                prop_assert!(matches!(weight, Some(w) if w > 0.0), "drew {} with weight {:?}", next, weight);
            }
        }
    }
}
