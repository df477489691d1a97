//! Stress and endurance tests for the job-shop core.
//!
//! These are marked `#[ignore]` for nightly CI runs. Run with:
//!   cargo test --package jobshop-core -- --ignored

use std::sync::Arc;

use jobshop_core::duration::{Distribution, DurationSource};
use jobshop_core::engine::Simulator;
use jobshop_core::id::*;
use jobshop_core::instance::*;
use jobshop_core::rollout::{EpisodeOutcome, evaluate_seeds, first_possible, run_episode};
use jobshop_core::sim::Time;
use jobshop_core::test_utils::*;

/// `jobs` x `machines` flow shop, durations in 1..=9.
fn big_flow_shop(jobs: usize, machines: usize) -> InstanceConfig {
    let durations: Vec<Vec<Time>> = (0..jobs)
        .map(|j| (0..machines).map(|m| ((j * 5 + m * 11) % 9 + 1) as Time).collect())
        .collect();
    let rows: Vec<&[Time]> = durations.iter().map(Vec::as_slice).collect();
    flow_shop(&rows, machines / 2 + 1)
}

/// 200 jobs over 20 machines: finishes, conserves jobs, and repeats
/// bit-for-bit.
#[test]
#[ignore]
fn large_flow_shop_is_deterministic() {
    let instance = big_flow_shop(200, 20);
    let a = first_possible_run(&instance, instance.initial_state().unwrap(), 0);
    let b = first_possible_run(&instance, instance.initial_state().unwrap(), 0);
    assert_eq!(a.state_hash(), b.state_hash());
    assert_jobs_conserved(&instance, &a);
    assert!(a.makespan().unwrap() >= instance.nominal_lower_bound());
}

/// Stochastic shop with frequent failures across many seeds.
#[test]
#[ignore]
fn many_seeds_with_failures() {
    let mut b = InstanceBuilder::new();
    let input = b.add_buffer(BufferSpec::new(BufferType::Fifo, 100), Some(BufferRole::Input));
    b.add_buffer(BufferSpec::UNBOUNDED_FIFO, Some(BufferRole::Output));
    let machines: Vec<MachineId> = (0..5).map(|_| b.add_machine(MachineSpec::default())).collect();
    for m in &machines {
        b.add_outage(
            (*m).into(),
            OutageConfig {
                kind: OutageKind::Failure,
                frequency: DurationSource::Stochastic(Distribution::Uniform { low: 5, high: 30 }),
                duration: DurationSource::Stochastic(Distribution::Uniform { low: 1, high: 6 }),
            },
        )
        .unwrap();
    }
    for _ in 0..3 {
        b.add_transport(TransportType::Agv, Location::Buffer(input));
    }
    for j in 0..100 {
        let ops = machines
            .iter()
            .cycle()
            .skip(j % 5)
            .take(5)
            .map(|m| {
                OperationSpec::new(
                    *m,
                    DurationSource::Stochastic(Distribution::Uniform { low: 1, high: 8 }),
                )
            })
            .collect();
        b.add_job(ops, (j % 4) as u32);
    }
    all_pairs_travel(&mut b, 2);
    let instance = Arc::new(b.build().unwrap());

    let seeds: Vec<u64> = (0..64).collect();
    for result in evaluate_seeds(Arc::clone(&instance), &seeds, 1_000_000) {
        let episode = result.unwrap();
        assert_eq!(episode.outcome, EpisodeOutcome::Done);
        assert_jobs_conserved(&instance, &episode.state);
    }
}

/// Step-by-step run that keeps every sub-state: the audit holds throughout.
#[test]
#[ignore]
fn every_sub_state_of_a_long_run_is_consistent() {
    let instance = big_flow_shop(60, 8);
    let mut sim = Simulator::seeded(instance.clone(), 0);
    let s0 = sim.initial_state().unwrap();
    let mut audited = 0usize;
    let episode = run_episode(
        &mut sim,
        s0,
        |s, possible| {
            assert_jobs_conserved(&instance, s);
            audited += 1;
            first_possible(s, possible)
        },
        1_000_000,
    )
    .unwrap();
    assert_eq!(episode.outcome, EpisodeOutcome::Done);
    assert!(audited > 60);
    assert_jobs_conserved(&instance, &episode.state);
}
