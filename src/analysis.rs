use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::agent::Agent;
use crate::config::{Scenario, SimulationConfig};
use crate::error::{ConfigError, InvariantViolation};
use crate::simulation::Simulation;
use crate::state::{CaseState, StateCounts};
use crate::trajectory::Trajectory;
use crate::types::{Cohort, Day};

/// Distribution statistics for a continuous metric.
#[derive(Debug, Clone)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Linearly interpolated quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    match sorted.get(below + 1) {
        Some(&above) => sorted[below] + (above - sorted[below]) * (rank - below as f64),
        None => sorted[below],
    }
}

/// Summary of `values`, which are sorted in place. `None` when empty.
/// `std_dev` is the sample standard deviation (zero for a single value).
pub fn percentile_stats(values: &mut [f64]) -> Option<DistStats> {
    values.sort_by(f64::total_cmp);
    let sorted: &[f64] = values;
    let (&min, &max) = (sorted.first()?, sorted.last()?);
    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let sum_sq: f64 = sorted.iter().map(|x| (x - mean) * (x - mean)).sum();
    let std_dev = if n > 1 { (sum_sq / (n - 1) as f64).sqrt() } else { 0.0 };

    let [p5, p25, p50, p75, p95] = [0.05, 0.25, 0.50, 0.75, 0.95].map(|p| quantile(sorted, p));
    Some(DistStats { n, min, p5, p25, p50, p75, p95, max, mean, std_dev })
}

// ── Trajectory invariants ─────────────────────────────────────────────────────

/// Snapshots must be labelled day 1, 2, 3, … with no gaps.
pub fn verify_day_sequence(trajectory: &Trajectory) -> Vec<InvariantViolation> {
    trajectory
        .snapshots()
        .iter()
        .enumerate()
        .filter_map(|(index, snap)| {
            let expected = Day(index as u32 + 1);
            (snap.day != expected).then_some(InvariantViolation::DayGap {
                index,
                expected,
                found: snap.day,
            })
        })
        .collect()
}

/// Population on consecutive days must differ by exactly `daily_arrivals`.
pub fn verify_growth(trajectory: &Trajectory, daily_arrivals: u32) -> Vec<InvariantViolation> {
    trajectory
        .snapshots()
        .windows(2)
        .filter_map(|pair| {
            let actual = pair[1].population() as i64 - pair[0].population() as i64;
            (actual != i64::from(daily_arrivals)).then_some(InvariantViolation::NonMonotonicGrowth {
                day: pair[1].day,
                expected: u64::from(daily_arrivals),
                actual,
            })
        })
        .collect()
}

/// Counts on day `d` must total `seeded + d × daily_arrivals`: nobody leaves.
pub fn verify_population(
    trajectory: &Trajectory,
    seeded: u64,
    daily_arrivals: u32,
) -> Vec<InvariantViolation> {
    trajectory
        .snapshots()
        .iter()
        .filter_map(|snap| {
            let population = seeded + u64::from(snap.day.0) * u64::from(daily_arrivals);
            let counted = snap.population();
            (counted != population).then_some(InvariantViolation::DayCountMismatch {
                day: snap.day,
                counted,
                population,
            })
        })
        .collect()
}

/// Run every trajectory check. Returns one item per violation found.
pub fn verify_trajectory(
    trajectory: &Trajectory,
    seeded: u64,
    daily_arrivals: u32,
) -> Vec<InvariantViolation> {
    let mut violations = verify_day_sequence(trajectory);
    violations.extend(verify_growth(trajectory, daily_arrivals));
    violations.extend(verify_population(trajectory, seeded, daily_arrivals));
    violations
}

// ── Per-agent time in system ──────────────────────────────────────────────────

/// How long arrivals spent in the pipeline, and how they left it.
#[derive(Debug, Clone)]
pub struct TimeInSystem {
    /// Days from arrival to a terminal state, over resolved arrivals.
    pub resolved: Option<DistStats>,
    pub unresolved: usize,
    /// Terminal state reached by each resolved arrival.
    pub outcomes: StateCounts,
}

/// Seeded agents entered the pipeline before day 0 and are skipped.
pub fn time_in_system<'a>(agents: impl IntoIterator<Item = &'a Agent>) -> TimeInSystem {
    let mut durations = Vec::new();
    let mut unresolved = 0;
    let mut outcomes = StateCounts::new();
    for agent in agents {
        let Cohort::Arrival(_) = agent.cohort else {
            continue;
        };
        match agent.resolved_on {
            Some(day) => {
                durations.push(f64::from(agent.days_in_system(day)));
                outcomes.increment(agent.current_state);
            }
            None => unresolved += 1,
        }
    }
    TimeInSystem { resolved: percentile_stats(&mut durations), unresolved, outcomes }
}

// ── Multi-run ─────────────────────────────────────────────────────────────────

/// Run `runs` independent copies of `base` in parallel under `scenario`.
/// Run `i` uses seed `start_seed + i`, wrapping at `u64::MAX`. Results are in
/// run order.
pub fn run_many(
    base: &SimulationConfig,
    scenario: &Scenario,
    start_seed: u64,
    runs: u64,
) -> Result<Vec<Trajectory>, ConfigError> {
    base.validate()?;
    scenario.validate()?;
    (0..runs)
        .into_par_iter()
        .map(|i| {
            let mut config = base.clone();
            config.seed = start_seed.wrapping_add(i);
            let mut sim = Simulation::from_config(config)?;
            Ok(sim.run_scenario(scenario)?.trajectory)
        })
        .collect()
}

/// Cross-run distribution of one state's count on one day.
#[derive(Debug, Clone)]
pub struct DayDist {
    pub day: Day,
    pub stats: DistStats,
}

/// Per-day distribution of `state` across runs, every `stride` days.
/// Days present in fewer than 2 runs are excluded.
pub fn analyse_distributions(runs: &[Trajectory], state: CaseState, stride: u32) -> Vec<DayDist> {
    let stride = stride.max(1);
    let all_days: BTreeSet<Day> = runs
        .iter()
        .flat_map(|t| t.snapshots().iter().map(|s| s.day))
        .filter(|d| d.0 % stride == 0)
        .collect();

    let mut result = Vec::new();
    for day in all_days {
        let mut values: Vec<f64> = runs
            .iter()
            .filter_map(|t| t.snapshots().iter().find(|s| s.day == day))
            .map(|s| s.counts[state] as f64)
            .collect();
        if values.len() < 2 {
            continue;
        }
        if let Some(stats) = percentile_stats(&mut values) {
            result.push(DayDist { day, stats });
        }
    }
    result
}

/// Baseline vs. scenario for one state, averaged over the `window` days
/// ending at `day` (a window of 1 compares the day alone).
#[derive(Debug, Clone)]
pub struct ScenarioComparison {
    pub state: CaseState,
    pub day: Day,
    pub window: u32,
    pub baseline: DistStats,
    pub scenario: DistStats,
}

impl ScenarioComparison {
    pub fn mean_difference(&self) -> f64 {
        self.scenario.mean - self.baseline.mean
    }
}

fn window_mean(trajectory: &Trajectory, state: CaseState, day: Day, window: u32) -> Option<f64> {
    let first = day.0.saturating_sub(window.max(1) - 1).max(1);
    let values: Vec<u64> = trajectory
        .snapshots()
        .iter()
        .filter(|s| s.day.0 >= first && s.day <= day)
        .map(|s| s.counts[state])
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<u64>() as f64 / values.len() as f64)
}

/// Run `base` and `scenario` under the same seeds and compare `state`.
/// Returns `None` when no run reached `day`.
pub fn compare_scenarios(
    base: &SimulationConfig,
    scenario: &Scenario,
    state: CaseState,
    day: Day,
    window: u32,
    start_seed: u64,
    runs: u64,
) -> Result<Option<ScenarioComparison>, ConfigError> {
    let baseline_runs = run_many(base, &Scenario::baseline(), start_seed, runs)?;
    let scenario_runs = run_many(base, scenario, start_seed, runs)?;

    let mut baseline: Vec<f64> =
        baseline_runs.iter().filter_map(|t| window_mean(t, state, day, window)).collect();
    let mut uplifted: Vec<f64> =
        scenario_runs.iter().filter_map(|t| window_mean(t, state, day, window)).collect();

    Ok(percentile_stats(&mut baseline).zip(percentile_stats(&mut uplifted)).map(
        |(baseline, scenario)| ScenarioComparison { state, day, window, baseline, scenario },
    ))
}
