//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::collections::{HashMap, VecDeque};

use crate::duration::{Distribution, DurationSampler, SampleKind};
use crate::engine::Simulator;
use crate::id::*;
use crate::instance::*;
use crate::rollout::{EpisodeOutcome, first_possible, run_episode};
use crate::sim::Time;
use crate::state::{BufferState, State};

// ===========================================================================
// Instance fixtures
// ===========================================================================

/// Give every ordered pair of distinct locations the same travel time.
pub fn all_pairs_travel(builder: &mut InstanceBuilder, duration: Time) {
    let locations = builder.locations();
    for from in &locations {
        for to in &locations {
            if from != to {
                builder.set_travel_time(*from, *to, duration);
            }
        }
    }
}

/// A flow shop: job `i` visits machines `0..n` in order with processing
/// times `durations[i]`.
///
/// Jobs start in a FIFO input buffer; finished jobs go to an unbounded
/// output buffer. All machine buffers are unbounded FIFO, `transports` AGVs
/// are parked at the input, and every trip takes zero time.
pub fn flow_shop(durations: &[&[Time]], transports: usize) -> InstanceConfig {
    flow_shop_builder(durations, transports)
        .build()
        .expect("flow shop fixture is valid")
}

/// The builder behind [`flow_shop`], for tests that tweak it further.
pub fn flow_shop_builder(durations: &[&[Time]], transports: usize) -> InstanceBuilder {
    let mut b = InstanceBuilder::new();
    let machine_count = durations.iter().map(|d| d.len()).max().unwrap_or(0);
    let input = b.add_buffer(
        BufferSpec::new(BufferType::Fifo, durations.len().max(1) as u32),
        Some(BufferRole::Input),
    );
    b.add_buffer(BufferSpec::UNBOUNDED_FIFO, Some(BufferRole::Output));
    let machines: Vec<MachineId> = (0..machine_count)
        .map(|_| b.add_machine(MachineSpec::default()))
        .collect();
    for _ in 0..transports {
        b.add_transport(TransportType::Agv, Location::Buffer(input));
    }
    for job in durations {
        let ops = job
            .iter()
            .zip(&machines)
            .map(|(d, m)| OperationSpec::new(*m, *d))
            .collect();
        b.add_job(ops, 0);
    }
    all_pairs_travel(&mut b, 0);
    b
}

/// One machine, no transports, jobs waiting in its pre-buffer.
pub fn single_machine(kind: BufferType, durations: &[Time]) -> InstanceConfig {
    let mut b = InstanceBuilder::new();
    let m = b.add_machine(MachineSpec::default().prebuffer(kind, u32::MAX));
    for d in durations {
        b.add_job(vec![OperationSpec::new(m, *d)], 0);
    }
    b.build().expect("single machine fixture is valid")
}

// ===========================================================================
// Samplers
// ===========================================================================

/// Replays scripted values per sample kind, falling back to the
/// distribution mean once a script runs dry.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSampler {
    scripts: HashMap<SampleKind, VecDeque<Time>>,
    /// Every draw served so far, in order.
    pub drawn: Vec<(SampleKind, Time)>,
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, kind: SampleKind, values: impl IntoIterator<Item = Time>) -> Self {
        self.scripts.entry(kind).or_default().extend(values);
        self
    }
}

impl DurationSampler for ScriptedSampler {
    fn sample(&mut self, distribution: &Distribution, kind: SampleKind) -> Time {
        let value = self
            .scripts
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| distribution.mean());
        self.drawn.push((kind, value));
        value
    }
}

// ===========================================================================
// Audits
// ===========================================================================

fn every_buffer(state: &State) -> impl Iterator<Item = &BufferState> {
    state
        .buffers
        .iter()
        .chain(
            state
                .machines
                .iter()
                .flat_map(|m| [&m.prebuffer, &m.buffer, &m.postbuffer]),
        )
        .chain(state.transports.iter().map(|t| &t.buffer))
}

/// Problems with job placement: a job stored zero or several times, a job
/// whose `location` disagrees with the buffer holding it, or a buffer over
/// capacity.
pub fn job_placement_errors(instance: &InstanceConfig, state: &State) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen: HashMap<JobId, Vec<BufferId>> = HashMap::new();
    for buffer in every_buffer(state) {
        for job in &buffer.store {
            seen.entry(*job).or_default().push(buffer.id);
        }
        match instance.buffer(buffer.id) {
            Ok(config) if buffer.store.len() > config.capacity as usize => errors.push(format!(
                "{} holds {} > {}",
                buffer.id,
                buffer.store.len(),
                config.capacity
            )),
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }
    }
    for job in &state.jobs {
        match seen.remove(&job.id).as_deref() {
            Some([only]) if *only == job.location => {}
            Some([only]) => errors.push(format!(
                "{} stored in {} but located at {}",
                job.id, only, job.location
            )),
            Some(many) => errors.push(format!("{} stored {} times", job.id, many.len())),
            None => errors.push(format!("{} is in no buffer", job.id)),
        }
    }
    for job in seen.keys() {
        errors.push(format!("unknown {job} stored"));
    }
    errors
}

/// Panic with a readable list if any job is misplaced.
pub fn assert_jobs_conserved(instance: &InstanceConfig, state: &State) {
    let errors = job_placement_errors(instance, state);
    assert!(errors.is_empty(), "job placement broken:\n{}", errors.join("\n"));
}

// ===========================================================================
// Drivers
// ===========================================================================

/// Run "accept the first possible transition" to completion and return the
/// final state. Panics if the run does not finish.
pub fn first_possible_run(instance: &InstanceConfig, state: State, seed: u64) -> State {
    let mut sim = Simulator::seeded(instance.clone(), seed);
    let episode = run_episode(&mut sim, state, first_possible, 10_000).expect("no invariant broken");
    assert_eq!(episode.outcome, EpisodeOutcome::Done, "{:?}", episode.outcome);
    episode.state
}
