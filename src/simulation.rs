use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info};

use crate::config::{Scenario, SimulationConfig};
use crate::error::ConfigError;
use crate::population::Population;
use crate::trajectory::{Snapshot, Trajectory};
use crate::transitions::StateMachine;
use crate::types::Day;

/// Result of one run: every agent as of the last day, plus the daily counts.
#[derive(Debug)]
pub struct SimulationOutput {
    pub population: Population,
    pub trajectory: Trajectory,
    pub daily_arrivals: u32,
}

/// Day-stepped driver. Owns its random stream, so independent simulations
/// (e.g. a baseline and a scenario) never share state and can run in parallel.
pub struct Simulation {
    config: SimulationConfig,
    machine: StateMachine,
    rng: ChaCha20Rng,
}

impl Simulation {
    /// Validate `config` and seed the random stream from `config.seed`.
    pub fn from_config(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let machine = config.state_machine()?;
        let rng = ChaCha20Rng::seed_from_u64(config.seed);
        Ok(Simulation { config, machine, rng })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Run with the sizes given in the config.
    pub fn run_configured(&mut self) -> SimulationOutput {
        let (cases, days, arrivals) =
            (self.config.initial_cases, self.config.days, self.config.daily_arrivals());
        self.run(cases, days, arrivals)
    }

    /// Run the config with the scenario's arrival uplift applied.
    pub fn run_scenario(&mut self, scenario: &Scenario) -> Result<SimulationOutput, ConfigError> {
        scenario.validate()?;
        let arrivals = scenario.daily_arrivals(self.config.daily_arrivals());
        debug!(scenario = %scenario.name, arrivals, "applying scenario");
        let (cases, days) = (self.config.initial_cases, self.config.days);
        Ok(self.run(cases, days, arrivals))
    }

    /// Seed the initial caseload, then for each day: add arrivals, advance
    /// every agent, and record end-of-day counts.
    pub fn run(
        &mut self,
        total_initial_cases: u64,
        num_days: u32,
        daily_arrival_count: u32,
    ) -> SimulationOutput {
        info!(
            seed = self.config.seed,
            initial_cases = total_initial_cases,
            days = num_days,
            daily_arrivals = daily_arrival_count,
            "simulation start"
        );

        let capacity = total_initial_cases + u64::from(num_days) * u64::from(daily_arrival_count);
        let mut population = Population::with_capacity(capacity as usize);
        let seeded = population.seed_initial_population(
            total_initial_cases,
            &self.config.seed_composition,
            &self.machine,
            &mut self.rng,
        );

        let mut trajectory = Trajectory::with_capacity(num_days as usize);
        let mut day = Day(0);
        for _ in 0..num_days {
            day = day.next();
            population.add_daily_arrivals(daily_arrival_count, day, &self.machine, &mut self.rng);
            let transitions = population.advance_one_day(&self.machine, &mut self.rng, day);
            let snapshot = Snapshot { day, counts: population.tally() };
            debug_assert_eq!(snapshot.population(), population.len() as u64);
            trajectory.push(snapshot);

            if day.0 % Day::DAYS_PER_YEAR == 0 {
                debug!(day = day.0, population = population.len(), transitions, "year complete");
            }
        }

        info!(
            seeded,
            final_population = population.len(),
            active = population.active_len(),
            "simulation complete"
        );

        SimulationOutput { population, trajectory, daily_arrivals: daily_arrival_count }
    }
}
