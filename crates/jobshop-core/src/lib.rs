//! Jobshop Core -- a discrete-event simulation core for job shops.
//!
//! Machines process jobs operation by operation, transports carry jobs
//! between buffers and machines, and an external controller (a dispatcher,
//! a heuristic, a learning agent) decides which of the currently possible
//! transitions to request each tick.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::step`] (or [`engine::Simulator::step`]) advances
//! the simulation through four phases:
//!
//! 1. **Requested** -- Apply the caller's transitions, transports first.
//! 2. **Clock** -- A [`sim::TimeStrategy`] picks the new simulated time.
//! 3. **Timed** -- Everything whose occupancy has expired fires, repeatedly,
//!    until the shop settles.
//! 4. **Result** -- The new state, the possible transitions, and a status.
//!
//! A rejected transition anywhere in the tick rolls the whole tick back.
//!
//! ```rust,ignore
//! let mut sim = Simulator::seeded(instance, 42);
//! let mut state = sim.initial_state()?;
//! while !is_done(&state) {
//!     let possible = sim.possible_transitions(&state)?;
//!     let result = sim.step(&state, &possible[..1], &JumpToEvent)?;
//!     state = result.state;
//! }
//! ```
//!
//! # Key Types
//!
//! - [`instance::InstanceConfig`] -- Immutable shop layout: machines,
//!   transports, buffers, jobs, and travel times. Built with
//!   [`instance::InstanceBuilder`].
//! - [`state::State`] -- The dynamic state, a plain cloneable value.
//! - [`transition::ComponentTransition`] -- A requested or possible
//!   lifecycle change of one component.
//! - [`engine::StepResult`] -- Everything a tick produced.
//! - [`duration::DurationSampler`] -- Injected source of stochastic durations.
//! - [`snapshot`] -- Versioned binary snapshots via bitcode.

pub mod buffer;
pub mod duration;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod id;
pub mod instance;
pub mod outage;
pub mod possible;
pub mod rng;
pub mod rollout;
pub mod setup;
pub mod sim;
pub mod snapshot;
pub mod state;
pub mod state_machine;
pub mod timed;
pub mod transition;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use engine::{SimulationOptions, Simulator, StepResult, is_done, step};
pub use error::{InvariantViolation, Rejection, SimError};
pub use instance::{InstanceBuilder, InstanceConfig};
pub use sim::{FixedIncrement, JumpToEvent, Time, TimeStrategy};
pub use state::State;
pub use transition::ComponentTransition;
