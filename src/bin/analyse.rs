//! Trajectory checker for casesim output.
//!
//! Reads a `--format ndjson` trajectory and prints:
//!   Tier 1: population invariants (PASS/FAIL per invariant)
//!   Tier 2: periodic state-count table

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use casesim::analysis::{verify_day_sequence, verify_growth, verify_population};
use casesim::error::InvariantViolation;
use casesim::state::CaseState;
use casesim::trajectory::Trajectory;

#[derive(Parser, Debug)]
#[command(name = "analyse", about = "Check a casesim trajectory")]
struct Args {
    #[arg(default_value = "trajectory.ndjson")]
    path: PathBuf,

    /// Expected daily arrivals; inferred from days 1 and 2 when omitted.
    #[arg(long)]
    arrivals: Option<u32>,

    /// Expected seeded caseload; inferred from day 1 when omitted.
    #[arg(long)]
    seeded: Option<u64>,

    #[arg(long, default_value_t = 30)]
    stride: u32,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let trajectory = match File::open(&args.path)
        .map_err(|e| e.to_string())
        .and_then(|f| Trajectory::read_ndjson(BufReader::new(f)).map_err(|e| e.to_string()))
    {
        Ok(t) => t,
        Err(e) => {
            error!("cannot load {}: {e}", args.path.display());
            eprintln!("Run `casesim --format ndjson --output {}` first.", args.path.display());
            return ExitCode::FAILURE;
        }
    };

    let Some(first) = trajectory.snapshots().first() else {
        println!("(empty trajectory)");
        return ExitCode::SUCCESS;
    };

    let arrivals = args.arrivals.unwrap_or_else(|| {
        trajectory
            .snapshots()
            .get(1)
            .map_or(0, |second| second.population().saturating_sub(first.population()) as u32)
    });
    let seeded = args.seeded.unwrap_or_else(|| {
        first.population().saturating_sub(u64::from(first.day.0) * u64::from(arrivals))
    });

    // ── Tier 1: invariants ────────────────────────────────────────────────────
    fn status(violations: &[InvariantViolation]) -> &'static str {
        if violations.is_empty() { "PASS" } else { "FAIL" }
    }

    let gaps = verify_day_sequence(&trajectory);
    let growth = verify_growth(&trajectory, arrivals);
    let counts = verify_population(&trajectory, seeded, arrivals);

    println!("=== Tier 1: Population Invariants (seeded {seeded}, {arrivals}/day) ===");
    println!("  [{}] Inv 1: One snapshot per day, days 1..n in order", status(&gaps));
    println!("  [{}] Inv 2: Population grows by exactly the daily arrivals", status(&growth));
    println!("  [{}] Inv 3: State counts total seeded + day x arrivals", status(&counts));

    let all: Vec<&InvariantViolation> = gaps.iter().chain(&growth).chain(&counts).collect();
    if all.is_empty() {
        println!("  All invariants PASS ({} days checked)", trajectory.len());
    } else {
        println!("\n  {} violation(s) detected:", all.len());
        for v in &all {
            println!("    {v}");
        }
    }
    println!();

    // ── Tier 2: state counts ──────────────────────────────────────────────────
    println!("=== Tier 2: State Counts (every {} days) ===", args.stride);
    print!("{:>5}", "Day");
    for state in CaseState::ALL {
        print!(" | {:>19}", state.as_str());
    }
    println!(" | {:>10}", "Total");
    println!("{}", "-".repeat(5 + (CaseState::COUNT + 1) * 22));
    let stride = args.stride.max(1);
    for snap in trajectory.snapshots().iter().filter(|s| s.day.0 % stride == 0) {
        print!("{:>5}", snap.day);
        for (_, n) in snap.counts.iter() {
            print!(" | {n:>19}");
        }
        println!(" | {:>10}", snap.population());
    }
    println!();

    if all.is_empty() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
