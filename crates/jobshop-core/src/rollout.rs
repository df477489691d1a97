//! Driving a simulation to completion with a policy.
//!
//! A policy looks at the current state and the possible transitions and
//! picks what to request next. [`first_possible`] always takes the first
//! offer, which together with priority ordering gives a simple greedy
//! dispatcher.

use std::sync::Arc;

use tracing::debug;

use crate::duration::{DurationSampler, SeededSampler};
use crate::engine::{Simulator, is_done};
use crate::error::InvariantViolation;
use crate::instance::{InstanceConfig, InstanceError};
use crate::sim::{JumpToEvent, Time};
use crate::state::State;
use crate::transition::ComponentTransition;

#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
    #[error("cannot build initial state: {0}")]
    Instance(#[from] InstanceError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeOutcome {
    Done,
    /// Nothing possible and nothing pending with jobs unfinished.
    Stalled,
    /// The policy asked for something the simulator refused.
    Rejected(String),
    StepLimit,
}

#[derive(Debug, Clone)]
pub struct Episode {
    pub state: State,
    pub steps: usize,
    pub outcome: EpisodeOutcome,
}

impl Episode {
    /// Completion time of the last job, once every job is done.
    pub fn makespan(&self) -> Option<Time> {
        match self.outcome {
            EpisodeOutcome::Done => self.state.makespan(),
            _ => None,
        }
    }
}

/// Request the first possible transition, if any.
pub fn first_possible(_: &State, possible: &[ComponentTransition]) -> Vec<ComponentTransition> {
    possible.first().copied().into_iter().collect()
}

/// Step `state` with `policy` until every job is done, the shop stalls, a
/// request is rejected, or `max_steps` ticks have run.
pub fn run_episode<S, P>(
    sim: &mut Simulator<S>,
    mut state: State,
    mut policy: P,
    max_steps: usize,
) -> Result<Episode, InvariantViolation>
where
    S: DurationSampler + Clone,
    P: FnMut(&State, &[ComponentTransition]) -> Vec<ComponentTransition>,
{
    for steps in 0..max_steps {
        if is_done(&state) {
            return Ok(Episode {
                state,
                steps,
                outcome: EpisodeOutcome::Done,
            });
        }
        let possible = sim.possible_transitions(&state)?;
        let requested = policy(&state, &possible);
        let result = sim.step(&state, &requested, &JumpToEvent)?;
        if !result.success {
            return Ok(Episode {
                state: result.state,
                steps: steps + 1,
                outcome: EpisodeOutcome::Rejected(result.message),
            });
        }
        state = result.state;
        if result.stalled {
            return Ok(Episode {
                state,
                steps: steps + 1,
                outcome: EpisodeOutcome::Stalled,
            });
        }
    }
    let outcome = if is_done(&state) {
        EpisodeOutcome::Done
    } else {
        EpisodeOutcome::StepLimit
    };
    debug!(steps = max_steps, ?outcome, "episode step budget exhausted");
    Ok(Episode {
        state,
        steps: max_steps,
        outcome,
    })
}

/// One greedy episode per seed, each with its own sampler.
///
/// With the `parallel` feature the episodes run on the rayon pool; results
/// come back in `seeds` order either way.
pub fn evaluate_seeds(
    instance: Arc<InstanceConfig>,
    seeds: &[u64],
    max_steps: usize,
) -> Vec<Result<Episode, RolloutError>> {
    let run = |seed: &u64| -> Result<Episode, RolloutError> {
        let mut sim = Simulator::new(Arc::clone(&instance), SeededSampler::new(*seed));
        let state = sim.initial_state()?;
        Ok(run_episode(&mut sim, state, first_possible, max_steps)?)
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        seeds.par_iter().map(run).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        seeds.iter().map(run).collect()
    }
}
