//! The step orchestrator.
//!
//! # Tick pipeline
//!
//! Each [`step`] runs:
//! 1. **Applying requested** -- caller transitions, transports before
//!    machines, each validated and applied in turn
//! 2. **Advancing clock** -- the [`TimeStrategy`] picks the new time
//! 3. **Applying timed** -- everything due fires; while no controller
//!    decision is possible the clock keeps jumping to the next event
//! 4. **Terminal** -- the result is assembled
//!
//! A rejected transition in any phase discards the whole tick: the caller
//! gets the pre-tick state back with `success == false`, and the sampler is
//! rewound so the random stream is as if the tick never ran.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::duration::{DurationSampler, SeededSampler};
use crate::error::{InvariantViolation, Rejection, SimError};
use crate::handlers::apply_transition;
use crate::instance::{InstanceConfig, InstanceError};
use crate::possible::possible_transitions;
use crate::sim::{TimeContext, TimeStrategy};
use crate::state::State;
use crate::timed::{apply_due_transitions, next_event_time};
use crate::transition::{ComponentTransition, sort_for_application};

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Keep the state after every applied transition in
    /// [`StepResult::sub_states`].
    pub record_sub_states: bool,
    /// Most transitions one tick may apply before it is declared runaway.
    pub max_cascade: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            record_sub_states: true,
            max_cascade: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickPhase {
    ApplyingRequested,
    AdvancingClock,
    ApplyingTimed,
    Terminal,
}

impl fmt::Display for TickPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TickPhase::ApplyingRequested => "applying requested transitions",
            TickPhase::AdvancingClock => "advancing clock",
            TickPhase::ApplyingTimed => "applying timed transitions",
            TickPhase::Terminal => "done",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// The post-tick state, or the untouched pre-tick state on failure.
    pub state: State,
    /// Intermediate states, one per applied transition (when recording).
    pub sub_states: Vec<State>,
    pub success: bool,
    pub message: String,
    /// What a controller may request from `state`.
    pub possible_transitions: Vec<ComponentTransition>,
    /// Requested transitions in the order they were applied.
    pub applied: Vec<ComponentTransition>,
    pub timed: Vec<ComponentTransition>,
    /// Unfinished, nothing possible, nothing pending.
    pub stalled: bool,
}

/// All operations of all jobs are done.
pub fn is_done(state: &State) -> bool {
    state.all_jobs_done()
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// Advance `state` by one tick.
///
/// Rejections come back as `Ok` with `success == false`; only invariant
/// violations are errors.
pub fn step<S: DurationSampler + Clone>(
    instance: &InstanceConfig,
    state: &State,
    requested: &[ComponentTransition],
    strategy: &dyn TimeStrategy,
    sampler: &mut S,
    options: &SimulationOptions,
) -> Result<StepResult, InvariantViolation> {
    let checkpoint = sampler.clone();
    let record = options.record_sub_states;
    let mut sub_states = Vec::new();

    // Phase 1: requested transitions.
    let mut ordered = requested.to_vec();
    sort_for_application(&mut ordered);
    let mut current = state.clone();
    for transition in &ordered {
        match apply_transition(instance, &current, transition, sampler) {
            Ok(next) => {
                current = next;
                if record {
                    sub_states.push(current.clone());
                }
            }
            Err(SimError::Rejected(rejection)) => {
                *sampler = checkpoint;
                return rejected(
                    instance,
                    state,
                    TickPhase::ApplyingRequested,
                    Some(transition),
                    rejection,
                );
            }
            Err(SimError::Invariant(e)) => return Err(e),
        }
    }

    // Phase 2: clock.
    let possible = possible_transitions(instance, &current)?;
    let next_event = next_event_time(instance, &current)?;
    let target = strategy.next_time(&TimeContext {
        instance,
        state: &current,
        possible: &possible,
        next_event,
    });
    if target < current.time {
        return Err(InvariantViolation::TimeReversal {
            from: current.time,
            to: target,
        });
    }
    if target != current.time {
        trace!(from = current.time, to = target, phase = %TickPhase::AdvancingClock, "clock moved");
    }
    current.time = target;

    // Phase 3: timed cascade.
    let mut timed = Vec::new();
    loop {
        let budget = options.max_cascade.saturating_sub(timed.len());
        let batch = match apply_due_transitions(instance, current, &mut *sampler, budget, record) {
            Ok(batch) => batch,
            Err(SimError::Rejected(rejection)) => {
                *sampler = checkpoint;
                return rejected(instance, state, TickPhase::ApplyingTimed, None, rejection);
            }
            Err(SimError::Invariant(e)) => return Err(e),
        };
        current = batch.state;
        sub_states.extend(batch.sub_states);
        let fired = batch.applied.len();
        timed.extend(batch.applied);

        if is_done(&current) {
            let finished = current.makespan().unwrap_or(0);
            current.time = state.time.max(finished);
            return Ok(StepResult {
                state: current,
                sub_states,
                success: true,
                message: TickPhase::Terminal.to_string(),
                possible_transitions: Vec::new(),
                applied: ordered,
                timed,
                stalled: false,
            });
        }
        if fired == 0 {
            break;
        }
        if possible_transitions(instance, &current)?.is_empty() {
            if let Some(t) = next_event_time(instance, &current)? {
                if t > current.time {
                    trace!(from = current.time, to = t, "jumping to next event");
                    current.time = t;
                }
            }
        }
    }

    // Phase 4: result.
    let possible = possible_transitions(instance, &current)?;
    let stalled = possible.is_empty() && next_event_time(instance, &current)?.is_none();
    if stalled {
        warn!(time = current.time, "simulation stalled: nothing possible, nothing pending");
    }
    Ok(StepResult {
        state: current,
        sub_states,
        success: true,
        message: if stalled { "stalled".to_string() } else { "ok".to_string() },
        possible_transitions: possible,
        applied: ordered,
        timed,
        stalled,
    })
}

fn rejected(
    instance: &InstanceConfig,
    state: &State,
    phase: TickPhase,
    transition: Option<&ComponentTransition>,
    rejection: Rejection,
) -> Result<StepResult, InvariantViolation> {
    let message = match transition {
        Some(t) => format!("{phase}: {t} rejected: {rejection}"),
        None => format!("{phase}: {rejection}"),
    };
    warn!(time = state.time, %message, "tick rejected");
    Ok(StepResult {
        state: state.clone(),
        sub_states: Vec::new(),
        success: false,
        message,
        possible_transitions: possible_transitions(instance, state)?,
        applied: Vec::new(),
        timed: Vec::new(),
        stalled: false,
    })
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Bundles an instance, a sampler, and options so callers only pass states
/// and requests.
#[derive(Debug, Clone)]
pub struct Simulator<S = SeededSampler> {
    instance: Arc<InstanceConfig>,
    sampler: S,
    options: SimulationOptions,
}

impl Simulator<SeededSampler> {
    pub fn seeded(instance: impl Into<Arc<InstanceConfig>>, seed: u64) -> Self {
        Self::new(instance, SeededSampler::new(seed))
    }
}

impl<S: DurationSampler + Clone> Simulator<S> {
    pub fn new(instance: impl Into<Arc<InstanceConfig>>, sampler: S) -> Self {
        Self {
            instance: instance.into(),
            sampler,
            options: SimulationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SimulationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn instance(&self) -> &InstanceConfig {
        &self.instance
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    pub fn initial_state(&self) -> Result<State, InstanceError> {
        self.instance.initial_state()
    }

    pub fn possible_transitions(
        &self,
        state: &State,
    ) -> Result<Vec<ComponentTransition>, InvariantViolation> {
        possible_transitions(&self.instance, state)
    }

    pub fn step(
        &mut self,
        state: &State,
        requested: &[ComponentTransition],
        strategy: &dyn TimeStrategy,
    ) -> Result<StepResult, InvariantViolation> {
        step(
            &self.instance,
            state,
            requested,
            strategy,
            &mut self.sampler,
            &self.options,
        )
    }
}
