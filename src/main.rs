use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use casesim::analysis::{self, DayDist, ScenarioComparison};
use casesim::config::{ArrivalRule, Scenario, SimulationConfig};
use casesim::simulation::{Simulation, SimulationOutput};
use casesim::state::CaseState;
use casesim::types::Day;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Ndjson,
}

/// Simulate the flow of criminal cases from investigation to disposal.
#[derive(Parser, Debug)]
#[command(name = "casesim", version, about)]
struct Args {
    /// TOML config; the built-in canonical config is used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    days: Option<u32>,

    #[arg(long)]
    initial_cases: Option<u64>,

    /// Fixed number of new cases per day, overriding the configured rule.
    #[arg(long)]
    arrivals: Option<u32>,

    /// Trajectory file for a single run.
    #[arg(short, long, default_value = "trajectory.csv")]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Run N seeds in parallel and print per-day distributions instead.
    #[arg(long)]
    runs: Option<u64>,

    /// Compare the baseline against arrivals scaled by this factor.
    #[arg(long)]
    uplift: Option<f64>,

    /// State reported in multi-run and scenario tables.
    #[arg(long, default_value = "CHARGED")]
    track: CaseState,

    /// Days between rows in multi-run tables.
    #[arg(long, default_value_t = 30)]
    stride: u32,

    /// Days averaged, ending on the last day, for scenario comparison.
    #[arg(long, default_value_t = 1)]
    window: u32,

    #[arg(short, long)]
    quiet: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn build_config(args: &Args) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            SimulationConfig::load(path)?
        }
        None => SimulationConfig::canonical(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(days) = args.days {
        config.days = days;
    }
    if let Some(n) = args.initial_cases {
        config.initial_cases = n;
    }
    if let Some(per_day) = args.arrivals {
        config.arrivals = ArrivalRule::Fixed { per_day };
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(args)?;

    if let Some(uplift) = args.uplift {
        let scenario = Scenario::new(format!("arrivals x{uplift}"), uplift)?;
        let runs = args.runs.unwrap_or(1);
        let cmp = analysis::compare_scenarios(
            &config,
            &scenario,
            args.track,
            Day(config.days),
            args.window,
            config.seed,
            runs,
        )?
        .ok_or("no run reached the comparison day")?;
        if !args.quiet {
            print_comparison(&cmp, &scenario, config.daily_arrivals(), runs);
        }
        return Ok(());
    }

    if let Some(n) = args.runs {
        let trajectories = analysis::run_many(&config, &Scenario::baseline(), config.seed, n)?;
        if !args.quiet {
            if n < 2 {
                warn!(runs = n, "distribution requires at least 2 runs");
            } else {
                let dists = analysis::analyse_distributions(&trajectories, args.track, args.stride);
                print_distributions(&dists, args.track, n);
            }
        }
        return Ok(());
    }

    let mut sim = Simulation::from_config(config)?;
    let out = sim.run_configured();

    let writer = BufWriter::new(File::create(&args.output)?);
    match args.format {
        Format::Csv => out.trajectory.write_csv(writer)?,
        Format::Ndjson => out.trajectory.write_ndjson(writer)?,
    }
    info!(path = %args.output.display(), days = out.trajectory.len(), "trajectory written");

    if !args.quiet {
        print_summary(&out, args.stride);
    }
    Ok(())
}

fn print_summary(out: &SimulationOutput, stride: u32) {
    println!("Daily arrivals: {}", out.daily_arrivals);
    println!("Final population: {}", out.population.len());

    println!("\n=== State counts (every {stride} days) ===");
    print!("{:>5}", "Day");
    for state in CaseState::ALL {
        print!(" | {:>19}", state.as_str());
    }
    println!();
    println!("{}", "-".repeat(5 + CaseState::COUNT * 22));
    let stride = stride.max(1);
    for snap in out.trajectory.snapshots().iter().filter(|s| s.day.0 % stride == 0) {
        print!("{:>5}", snap.day);
        for (_, n) in snap.counts.iter() {
            print!(" | {n:>19}");
        }
        println!();
    }

    let tis = analysis::time_in_system(out.population.iter());
    println!("\n=== Time in system (arrivals) ===");
    println!("  Unresolved: {}", tis.unresolved);
    if let Some(ds) = tis.resolved {
        println!(
            "  Resolved:   {} | min {:.0} | p50 {:.0} | p95 {:.0} | max {:.0} | mean {:.1}",
            ds.n, ds.min, ds.p50, ds.p95, ds.max, ds.mean
        );
    }
}

fn print_distributions(dists: &[DayDist], state: CaseState, n_runs: u64) {
    println!("\n=== Multi-Run Distribution of {state} (N={n_runs} runs) ===");
    println!(
        "{:>5} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8}",
        "Day", "min", "p5", "p25", "p50", "p75", "p95", "max", "mean", "stddev"
    );
    for dd in dists {
        let ds = &dd.stats;
        println!(
            "{:>5} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1}",
            dd.day, ds.min, ds.p5, ds.p25, ds.p50, ds.p75, ds.p95, ds.max, ds.mean, ds.std_dev,
        );
    }
}

fn print_comparison(cmp: &ScenarioComparison, scenario: &Scenario, baseline_daily: u32, runs: u64) {
    println!(
        "\n=== {} at day {} (window {}, N={runs} runs) ===",
        cmp.state, cmp.day, cmp.window
    );
    println!(
        "{:>10} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8}",
        "Run", "Arrivals", "min", "p50", "max", "mean"
    );
    let rows = [
        ("baseline", baseline_daily, &cmp.baseline),
        (scenario.name.as_str(), scenario.daily_arrivals(baseline_daily), &cmp.scenario),
    ];
    for (name, arrivals, ds) in rows {
        println!(
            "{name:>10} | {arrivals:>8} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1}",
            ds.min, ds.p50, ds.max, ds.mean
        );
    }
    println!("Mean difference: {:+.2}", cmp.mean_difference());
}
