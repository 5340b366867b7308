use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use casesim::config::{ArrivalRule, SimulationConfig};
use casesim::population::Population;
use casesim::simulation::Simulation;
use casesim::transitions::StateMachine;
use casesim::types::Day;

pub struct Scale {
    pub initial_cases: u64,
    pub arrivals_per_day: u32,
}

pub const SMALL: Scale = Scale { initial_cases: 1_000, arrivals_per_day: 37 };

pub const MEDIUM: Scale = Scale { initial_cases: 10_000, arrivals_per_day: 374 };

pub const LARGE: Scale = Scale { initial_cases: 100_000, arrivals_per_day: 3_740 };

pub fn config(scale: &Scale, seed: u64, days: u32) -> SimulationConfig {
    let mut config = SimulationConfig::canonical();
    config.seed = seed;
    config.initial_cases = scale.initial_cases;
    config.days = days;
    config.arrivals = ArrivalRule::Fixed { per_day: scale.arrivals_per_day };
    config
}

/// A `Simulation` ready to run `days` days at `scale`.
pub fn build_simulation(scale: &Scale, seed: u64, days: u32) -> Simulation {
    Simulation::from_config(config(scale, seed, days)).expect("canonical config is valid")
}

/// A population already `warm_days` into a run, so the active/terminal mix
/// resembles a steady state rather than day 0.
pub fn warmed_population(scale: &Scale, warm_days: u32) -> (Population, StateMachine, ChaCha20Rng) {
    let config = config(scale, 42, warm_days);
    let machine = config.state_machine().expect("canonical config is valid");
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let mut population = Population::new();
    population.seed_initial_population(
        scale.initial_cases,
        &config.seed_composition,
        &machine,
        &mut rng,
    );
    for d in 1..=warm_days {
        population.add_daily_arrivals(scale.arrivals_per_day, Day(d), &machine, &mut rng);
        population.advance_one_day(&machine, &mut rng, Day(d));
    }
    (population, machine, rng)
}
