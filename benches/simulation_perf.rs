mod fixtures;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use casesim::state::CaseState;
use casesim::transitions::StateMachine;
use casesim::types::Day;

use fixtures::{LARGE, MEDIUM, SMALL, build_simulation, warmed_population};

// ── Group 1: advance_one_day, population size scaling ──────────────────────

fn bench_advance_one_day(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance_one_day");
    for (name, scale) in [("small", &SMALL), ("medium", &MEDIUM), ("large", &LARGE)] {
        let (population, machine, rng) = warmed_population(scale, 365);
        group.throughput(Throughput::Elements(population.active_len() as u64));
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter_batched(
                || (population.clone(), rng.clone()),
                |(mut pop, mut rng)| pop.advance_one_day(&machine, &mut rng, Day(366)),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

// ── Group 2: full_run, end-to-end, two simulated years ──────────────────────

fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_run");
    group.sample_size(10);
    for (name, scale) in [("small", &SMALL), ("medium", &MEDIUM)] {
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter_batched(
                || build_simulation(scale, 42, 730),
                |mut sim| sim.run_configured(),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

// ── Group 3: tally, daily count over a growing population ──────────────────

fn bench_tally(c: &mut Criterion) {
    let mut group = c.benchmark_group("tally");
    for &days in &[30u32, 365, 730] {
        let (population, _, _) = warmed_population(&MEDIUM, days);
        group.throughput(Throughput::Elements(population.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(days), &population, |b, pop| {
            b.iter(|| pop.tally())
        });
    }
    group.finish();
}

// ── Group 4: sampling, sojourn and successor draws in isolation ─────────────

fn bench_sampling(c: &mut Criterion) {
    let machine = StateMachine::canonical();
    let mut group = c.benchmark_group("sampling");
    group.throughput(Throughput::Elements(1));
    for state in [CaseState::UnderInvestigation, CaseState::Charged, CaseState::InMc] {
        group.bench_with_input(BenchmarkId::new("next_state", state), &state, |b, &s| {
            let mut rng = ChaCha20Rng::seed_from_u64(42);
            b.iter(|| machine.next_state(s, &mut rng))
        });
    }
    group.bench_function("sojourn/CC_BACKLOG", |b| {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        b.iter(|| machine.sample_sojourn(CaseState::CcBacklog, &mut rng))
    });
    group.finish();
}

criterion_group!(benches, bench_advance_one_day, bench_full_run, bench_tally, bench_sampling);
criterion_main!(benches);
