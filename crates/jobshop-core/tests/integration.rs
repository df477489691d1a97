//! Integration tests for the job-shop simulation core.
//!
//! These tests drive whole ticks through the public API: transports and
//! machines interacting, timed cascades, outages, rollback, snapshots, and
//! determinism.

use jobshop_core::duration::{Distribution, DurationSource, SeededSampler};
use jobshop_core::engine::{Simulator, is_done};
use jobshop_core::handlers::apply_transition;
use jobshop_core::id::*;
use jobshop_core::instance::*;
use jobshop_core::possible::possible_transitions;
use jobshop_core::sim::{FixedIncrement, JumpToEvent, Time};
use jobshop_core::snapshot::{decode_state, encode_state};
use jobshop_core::state::{MachineStatus, State, TransportStatus};
use jobshop_core::test_utils::*;
use jobshop_core::timed::due_transitions;
use jobshop_core::transition::{ComponentStatus, ComponentTransition};
use jobshop_core::{Rejection, SimError};

fn op_ends(state: &State, job: u32) -> Vec<Option<Time>> {
    state.jobs[job as usize]
        .operations
        .iter()
        .map(|o| o.end_time)
        .collect()
}

// ===========================================================================
// Reference flow shop
// ===========================================================================
//
// Three jobs over three machines, zero travel, three AGVs, every buffer
// FIFO. Always accepting the first possible transition finishes at 11.

#[test]
fn first_possible_flow_shop_reaches_reference_makespan() {
    let instance = flow_shop(&[&[1, 3, 3], &[2, 3, 2], &[2, 3, 1]], 3);
    let s0 = instance.initial_state().unwrap();
    let done = first_possible_run(&instance, s0, 0);

    assert!(is_done(&done));
    assert_eq!(done.time, 11);
    assert_eq!(done.makespan(), Some(11));
    assert_eq!(op_ends(&done, 0), vec![Some(1), Some(4), Some(7)]);
    assert_eq!(op_ends(&done, 1), vec![Some(3), Some(7), Some(9)]);
    assert_eq!(op_ends(&done, 2), vec![Some(5), Some(10), Some(11)]);
    assert!(done.makespan().unwrap() >= instance.nominal_lower_bound());
    assert_jobs_conserved(&instance, &done);
}

#[test]
fn every_tick_of_the_reference_run_conserves_jobs() {
    let instance = flow_shop(&[&[1, 3, 3], &[2, 3, 2], &[2, 3, 1]], 3);
    let mut sim = Simulator::seeded(instance.clone(), 0);
    let mut state = sim.initial_state().unwrap();
    let mut ticks = 0;
    while !is_done(&state) {
        let possible = sim.possible_transitions(&state).unwrap();
        let result = sim.step(&state, &possible[..possible.len().min(1)], &JumpToEvent).unwrap();
        assert!(result.success, "{}", result.message);
        assert!(result.state.time >= state.time);
        assert_eq!(result.sub_states.len(), result.applied.len() + result.timed.len());
        for sub in &result.sub_states {
            assert_jobs_conserved(&instance, sub);
        }
        state = result.state;
        ticks += 1;
        assert!(ticks < 100, "reference run did not finish");
    }
}

// ===========================================================================
// Same-tick causality
// ===========================================================================

#[test]
fn delivery_and_machine_release_start_the_next_job_in_one_tick() {
    let mut b = InstanceBuilder::new();
    let input = b.add_buffer(BufferSpec::new(BufferType::Fifo, 2), Some(BufferRole::Input));
    let m = b.add_machine(MachineSpec::default());
    b.add_transport(TransportType::Agv, Location::Buffer(input));
    b.add_transport(TransportType::Agv, Location::Buffer(input));
    // Finished jobs can leave, so the shop has work to offer at t=4.
    let output = b.add_buffer(BufferSpec::UNBOUNDED_FIFO, Some(BufferRole::Output));
    b.add_job(vec![OperationSpec::new(m, 2)], 0);
    b.add_job(vec![OperationSpec::new(m, 2)], 0);
    b.set_symmetric_travel_time(Location::Buffer(input), Location::Machine(m), 2);
    b.set_symmetric_travel_time(Location::Machine(m), Location::Buffer(output), 2);
    let instance = b.build().unwrap();
    let mut sim = Simulator::seeded(instance, 0);
    let s0 = sim.initial_state().unwrap();

    // t=0: first job leaves, arrives at 2 and works until 4.
    let take_first =
        ComponentTransition::transport(TransportId(0), TransportStatus::Working, Some(JobId(0)));
    let s1 = sim.step(&s0, &[take_first], &JumpToEvent).unwrap().state;
    let s2 = sim.step(&s1, &[], &FixedIncrement(2)).unwrap().state;
    assert_eq!(s2.machines[0].status, MachineStatus::Working);
    assert_eq!(s2.machines[0].occupied_until, Some(4));

    // t=2: second job leaves and arrives exactly when the machine frees up.
    let take_second =
        ComponentTransition::transport(TransportId(1), TransportStatus::Working, Some(JobId(1)));
    let result = sim.step(&s2, &[take_second], &JumpToEvent).unwrap();
    assert!(result.success);
    assert_eq!(result.state.time, 4);
    let second = &result.state.jobs[1].operations[0];
    assert_eq!(second.start_time, Some(4));
    assert_eq!(second.end_time, Some(6));
    assert_eq!(result.state.machines[0].status, MachineStatus::Working);

    let delivered = result
        .timed
        .iter()
        .position(|t| {
            t.component == TransportId(1).into()
                && t.target == ComponentStatus::Transport(TransportStatus::Outage)
        })
        .unwrap();
    let started = result
        .timed
        .iter()
        .position(|t| {
            t.job == Some(JobId(1)) && t.target == ComponentStatus::Machine(MachineStatus::Setup)
        })
        .unwrap();
    assert!(delivered < started);
}

// ===========================================================================
// Buffer policies
// ===========================================================================

#[test]
fn fifo_prebuffer_starts_the_oldest_job() {
    let instance = single_machine(BufferType::Fifo, &[1, 1, 1]);
    let state = instance.initial_state().unwrap();
    let due = due_transitions(&instance, &state).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].job, Some(JobId(0)));
}

#[test]
fn lifo_prebuffer_starts_the_newest_job() {
    let instance = single_machine(BufferType::Lifo, &[1, 1, 1]);
    let state = instance.initial_state().unwrap();
    let due = due_transitions(&instance, &state).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].job, Some(JobId(2)));

    let done = first_possible_run(&instance, state, 0);
    assert_eq!(op_ends(&done, 2), vec![Some(1)]);
    assert_eq!(op_ends(&done, 0), vec![Some(3)]);
}

#[test]
fn flex_prebuffer_waits_for_a_request() {
    let instance = single_machine(BufferType::Flex, &[4, 1]);
    let mut sim = Simulator::seeded(instance, 0);
    let s0 = sim.initial_state().unwrap();

    let idle = sim.step(&s0, &[], &JumpToEvent).unwrap();
    assert_eq!(idle.state, s0);
    assert_eq!(idle.possible_transitions.len(), 2);

    let pick_second =
        ComponentTransition::machine(MachineId(0), MachineStatus::Setup, Some(JobId(1)));
    let started = sim.step(&s0, &[pick_second], &JumpToEvent).unwrap();
    assert!(started.success);
    assert_eq!(started.state.jobs[1].operations[0].start_time, Some(0));
}

#[test]
fn teleporter_ignores_lifo_order_and_distance() {
    let mut b = InstanceBuilder::new();
    let input = b.add_buffer(BufferSpec::new(BufferType::Lifo, 3), Some(BufferRole::Input));
    let m = b.add_machine(MachineSpec::default());
    b.add_transport(TransportType::Teleporter, Location::Buffer(input));
    for _ in 0..3 {
        b.add_job(vec![OperationSpec::new(m, 1)], 0);
    }
    // No travel times at all: teleporters never look them up.
    let instance = b.build().unwrap();
    let s0 = instance.initial_state().unwrap();
    let mut sim = Simulator::seeded(instance.clone(), 0);
    let take_bottom =
        ComponentTransition::transport(TransportId(0), TransportStatus::Working, Some(JobId(0)));
    let result = sim.step(&s0, &[take_bottom], &JumpToEvent).unwrap();
    assert!(result.success, "{}", result.message);
    assert_eq!(result.state.time, 0);
    assert_eq!(result.state.jobs[0].operations[0].start_time, Some(0));

    let done = first_possible_run(&instance, result.state, 0);
    assert_eq!(done.makespan(), Some(3));
}

#[test]
fn single_agv_drains_a_lifo_input() {
    let mut b = InstanceBuilder::new();
    let input = b.add_buffer(BufferSpec::new(BufferType::Lifo, 2), Some(BufferRole::Input));
    let m = b.add_machine(MachineSpec::default());
    b.add_transport(TransportType::Agv, Location::Buffer(input));
    b.add_job(vec![OperationSpec::new(m, 2)], 0);
    b.add_job(vec![OperationSpec::new(m, 2)], 0);
    b.set_symmetric_travel_time(Location::Buffer(input), Location::Machine(m), 1);
    let instance = b.build().unwrap();
    let s0 = instance.initial_state().unwrap();

    // Only the top of the stack is offered to the AGV.
    assert_eq!(
        possible_transitions(&instance, &s0).unwrap(),
        vec![ComponentTransition::transport(
            TransportId(0),
            TransportStatus::Working,
            Some(JobId(1)),
        )]
    );

    let done = first_possible_run(&instance, s0, 0);
    assert_eq!(op_ends(&done, 1), vec![Some(3)]);
    assert_eq!(op_ends(&done, 0), vec![Some(5)]);
    assert_jobs_conserved(&instance, &done);
}

// ===========================================================================
// Outages
// ===========================================================================
//
// Frequency 10, duration 5, four jobs of 4 each: the outage can only fire
// after the third job (12 - 0 >= 10), holds it until 17, and the next cycle
// starts from there.

#[test]
fn outage_waits_for_its_frequency_then_lasts_its_duration() {
    let mut b = InstanceBuilder::new();
    let m = b.add_machine(MachineSpec::default());
    for _ in 0..4 {
        b.add_job(vec![OperationSpec::new(m, 4)], 0);
    }
    b.add_outage(
        m.into(),
        OutageConfig {
            kind: OutageKind::Maintenance,
            frequency: DurationSource::Fixed(10),
            duration: DurationSource::Fixed(5),
        },
    )
    .unwrap();
    let instance = b.build().unwrap();
    let done = first_possible_run(&instance, instance.initial_state().unwrap(), 0);

    let ends: Vec<Option<Time>> = (0..4).map(|j| op_ends(&done, j)[0]).collect();
    assert_eq!(ends, vec![Some(4), Some(8), Some(17), Some(21)]);
    let starts: Vec<Option<Time>> = done.jobs.iter().map(|j| j.operations[0].start_time).collect();
    assert_eq!(starts, vec![Some(0), Some(4), Some(8), Some(17)]);
    assert_eq!(done.time, 21);
}

#[test]
fn transport_outage_follows_delivery() {
    let mut b = flow_shop_builder(&[&[1], &[1]], 1);
    b.add_outage(
        TransportId(0).into(),
        OutageConfig {
            kind: OutageKind::Recharge,
            frequency: DurationSource::Fixed(0),
            duration: DurationSource::Fixed(3),
        },
    )
    .unwrap();
    let instance = b.build().unwrap();
    let mut sim = Simulator::seeded(instance, 0);
    let s0 = sim.initial_state().unwrap();
    let first = sim.possible_transitions(&s0).unwrap()[0];
    let result = sim.step(&s0, &[first], &JumpToEvent).unwrap();

    // Recharging right after the first delivery keeps the only vehicle busy
    // until 3, so the tick runs on to then.
    assert!(result.sub_states.iter().any(|s| {
        s.transports[0].status == TransportStatus::Outage
            && s.transports[0].occupied_until == Some(3)
    }));
    assert_eq!(result.state.time, 3);
    assert_eq!(result.state.transports[0].status, TransportStatus::Idle);
    assert!(!result.possible_transitions.is_empty());
}

// ===========================================================================
// Setup times
// ===========================================================================

#[test]
fn tool_change_costs_setup_time_once() {
    let mut b = InstanceBuilder::new();
    let m = b.add_machine(MachineSpec::default());
    b.add_setup_time(m, ToolId(0), ToolId(1), 2).unwrap();
    b.add_job(vec![OperationSpec::new(m, 3).with_tool(ToolId(1))], 0);
    b.add_job(vec![OperationSpec::new(m, 3).with_tool(ToolId(1))], 0);
    let instance = b.build().unwrap();
    let done = first_possible_run(&instance, instance.initial_state().unwrap(), 0);

    assert_eq!(done.jobs[0].operations[0].start_time, Some(2));
    assert_eq!(done.jobs[0].operations[0].end_time, Some(5));
    assert_eq!(done.jobs[1].operations[0].start_time, Some(5));
    assert_eq!(done.jobs[1].operations[0].end_time, Some(8));
    assert_eq!(done.machines[0].mounted_tool, ToolId(1));
}

// ===========================================================================
// Rollback
// ===========================================================================

#[test]
fn two_requests_for_one_machine_roll_back_the_tick() {
    let instance = single_machine(BufferType::Flex, &[2, 2]);
    let mut sim = Simulator::seeded(instance, 0);
    let s0 = sim.initial_state().unwrap();
    let a = ComponentTransition::machine(MachineId(0), MachineStatus::Setup, Some(JobId(0)));
    let b = ComponentTransition::machine(MachineId(0), MachineStatus::Setup, Some(JobId(1)));

    let result = sim.step(&s0, &[a, b], &JumpToEvent).unwrap();
    assert!(!result.success);
    assert_eq!(result.state, s0);
    assert!(result.sub_states.is_empty());
    assert_eq!(result.possible_transitions, vec![a, b]);
}

#[test]
fn rollback_rewinds_the_sampler() {
    let mut b = InstanceBuilder::new();
    let input = b.add_buffer(BufferSpec::new(BufferType::Fifo, 1), Some(BufferRole::Input));
    let m = b.add_machine(MachineSpec::default());
    b.add_transport(TransportType::Agv, Location::Machine(m));
    b.add_job(vec![OperationSpec::new(m, 2)], 0);
    b.set_symmetric_travel_time(
        Location::Buffer(input),
        Location::Machine(m),
        DurationSource::Stochastic(Distribution::Uniform { low: 1, high: 9 }),
    );
    let instance = b.build().unwrap();
    let mut sim = Simulator::seeded(instance, 99);
    let s0 = sim.initial_state().unwrap();
    let before: SeededSampler = sim.sampler().clone();

    let fetch =
        ComponentTransition::transport(TransportId(0), TransportStatus::Working, Some(JobId(0)));
    // The job is still in the input buffer, not at the machine.
    let bogus = ComponentTransition::machine(MachineId(0), MachineStatus::Setup, Some(JobId(0)));
    let result = sim.step(&s0, &[fetch, bogus], &JumpToEvent).unwrap();
    assert!(!result.success);
    assert_eq!(sim.sampler(), &before);

    let retried = sim.step(&s0, &[fetch], &JumpToEvent).unwrap();
    let mut replay = Simulator::seeded(sim.instance().clone(), 99);
    let fresh = replay.step(&s0, &[fetch], &JumpToEvent).unwrap();
    assert_eq!(retried.state, fresh.state);
}

// ===========================================================================
// Logistics capacity
// ===========================================================================

#[test]
fn logistics_capacity_limits_vehicles_en_route() {
    let mut b = flow_shop_builder(&[&[1], &[1]], 2);
    all_pairs_travel(&mut b, 5);
    b.set_logistics_capacity(1);
    let instance = b.build().unwrap();
    let s0 = instance.initial_state().unwrap();
    assert_eq!(possible_transitions(&instance, &s0).unwrap().len(), 4);

    let mut sampler = SeededSampler::new(0);
    let t0 = ComponentTransition::transport(TransportId(0), TransportStatus::Working, Some(JobId(0)));
    let s1 = apply_transition(&instance, &s0, &t0, &mut sampler).unwrap();
    assert!(possible_transitions(&instance, &s1).unwrap().is_empty());

    let t1 = ComponentTransition::transport(TransportId(1), TransportStatus::Working, Some(JobId(1)));
    assert_eq!(
        apply_transition(&instance, &s1, &t1, &mut sampler),
        Err(SimError::Rejected(Rejection::LogisticsSaturated { capacity: 1 }))
    );
}

// ===========================================================================
// Snapshots and determinism
// ===========================================================================

#[test]
fn snapshot_mid_run_resumes_identically() {
    let instance = flow_shop(&[&[2, 1, 3], &[1, 2, 2], &[3, 1, 1]], 2);
    let mut sim = Simulator::seeded(instance.clone(), 5);
    let mut state = sim.initial_state().unwrap();
    for _ in 0..6 {
        let possible = sim.possible_transitions(&state).unwrap();
        state = sim.step(&state, &possible[..possible.len().min(1)], &JumpToEvent).unwrap().state;
    }
    let restored = decode_state(&encode_state(&state).unwrap()).unwrap();
    assert_eq!(restored.state_hash(), state.state_hash());

    let a = first_possible_run(&instance, state, 5);
    let b = first_possible_run(&instance, restored, 5);
    assert_eq!(a, b);
}

#[test]
fn stochastic_runs_repeat_under_a_seed() {
    let mut b = InstanceBuilder::new();
    let input = b.add_buffer(BufferSpec::new(BufferType::Fifo, 4), Some(BufferRole::Input));
    let m0 = b.add_machine(MachineSpec::default());
    let m1 = b.add_machine(MachineSpec::default());
    let d = || DurationSource::Stochastic(Distribution::Choice(vec![1, 4, 6]));
    for _ in 0..4 {
        b.add_job(vec![OperationSpec::new(m0, d()), OperationSpec::new(m1, d())], 0);
    }
    b.add_transport(TransportType::Agv, Location::Buffer(input));
    all_pairs_travel(&mut b, 1);
    let instance = b.build().unwrap();

    let run = |seed| first_possible_run(&instance, instance.initial_state().unwrap(), seed);
    let a = run(17);
    let b = run(17);
    assert_eq!(a, b);
    assert_eq!(a.state_hash(), b.state_hash());
    assert_jobs_conserved(&instance, &a);
}
