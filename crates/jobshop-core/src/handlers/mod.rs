//! Transition handlers.
//!
//! [`apply_transition`] checks lifecycle legality and then dispatches on the
//! exact `(from, to)` pair via enum match. Handlers check their
//! preconditions against the input state (failures are [`Rejection`]s) and
//! then mutate a clone; anything inconsistent found while mutating is an
//! [`InvariantViolation`]. A lifecycle pair no handler implements is a
//! rejection when a controller asked for it and fatal when the timed
//! cascade produced it.

mod machine;
mod transport;

use tracing::debug;

use crate::duration::DurationSampler;
use crate::error::{InvariantViolation, Rejection, SimError};
use crate::id::{BufferId, ComponentId, JobId};
use crate::instance::InstanceConfig;
use crate::sim::Time;
use crate::state::{MachineStatus, State, TransportStatus};
use crate::state_machine::{Lifecycle, is_valid_transition};
use crate::transition::{ComponentStatus, ComponentTransition};

/// Who asked for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Requested,
    Timed,
}

/// What every handler needs besides the state.
pub(crate) struct Ctx<'a> {
    pub instance: &'a InstanceConfig,
    pub sampler: &'a mut dyn DurationSampler,
    pub origin: Origin,
}

/// Apply one requested transition to `state`, returning the successor state.
pub fn apply_transition(
    instance: &InstanceConfig,
    state: &State,
    transition: &ComponentTransition,
    sampler: &mut dyn DurationSampler,
) -> Result<State, SimError> {
    apply(instance, state, transition, sampler, Origin::Requested)
}

/// Apply a transition discovered by the timed cascade.
pub(crate) fn apply_timed_transition(
    instance: &InstanceConfig,
    state: &State,
    transition: &ComponentTransition,
    sampler: &mut dyn DurationSampler,
) -> Result<State, SimError> {
    apply(instance, state, transition, sampler, Origin::Timed)
}

fn apply(
    instance: &InstanceConfig,
    state: &State,
    transition: &ComponentTransition,
    sampler: &mut dyn DurationSampler,
    origin: Origin,
) -> Result<State, SimError> {
    let mut ctx = Ctx {
        instance,
        sampler,
        origin,
    };
    let component = transition.component;
    let from = current_status(state, component)?;

    let next = match (component, from, transition.target) {
        (
            ComponentId::Machine(id),
            ComponentStatus::Machine(from),
            ComponentStatus::Machine(to),
        ) => {
            check_legal(component, from, to, ComponentStatus::Machine)?;
            machine::dispatch(&mut ctx, state, id, from, to, transition.job)?
        }
        (
            ComponentId::Transport(id),
            ComponentStatus::Transport(from),
            ComponentStatus::Transport(to),
        ) => {
            check_legal(component, from, to, ComponentStatus::Transport)?;
            transport::dispatch(&mut ctx, state, id, from, to, transition.job)?
        }
        (ComponentId::Buffer(_), ..) => {
            return Err(Rejection::NotRequestable { component }.into());
        }
        (.., target) => {
            return Err(Rejection::KindMismatch { component, target }.into());
        }
    };

    debug!(
        time = state.time,
        %component,
        %from,
        to = %transition.target,
        job = ?transition.job,
        "transition applied"
    );
    Ok(next)
}

fn current_status(
    state: &State,
    component: ComponentId,
) -> Result<ComponentStatus, InvariantViolation> {
    Ok(match component {
        ComponentId::Machine(id) => ComponentStatus::Machine(state.machine(id)?.status),
        ComponentId::Transport(id) => ComponentStatus::Transport(state.transport(id)?.status),
        ComponentId::Buffer(id) => ComponentStatus::Buffer(
            state
                .buffer(id)
                .ok_or(InvariantViolation::UnknownComponent(component))?
                .status,
        ),
    })
}

fn check_legal<L: Lifecycle>(
    component: ComponentId,
    from: L,
    to: L,
    wrap: fn(L) -> ComponentStatus,
) -> Result<(), Rejection> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(Rejection::IllegalTransition {
            component,
            from: wrap(from),
            to: wrap(to),
        })
    }
}

/// Handler reached for a legal pair no handler implements.
fn unhandled(
    origin: Origin,
    component: ComponentId,
    from: ComponentStatus,
    to: ComponentStatus,
) -> SimError {
    match origin {
        Origin::Requested => Rejection::IllegalTransition {
            component,
            from,
            to,
        }
        .into(),
        Origin::Timed => InvariantViolation::UnhandledTransition {
            component,
            from,
            to,
        }
        .into(),
    }
}

pub(crate) fn unhandled_machine(
    origin: Origin,
    component: ComponentId,
    from: MachineStatus,
    to: MachineStatus,
) -> SimError {
    unhandled(
        origin,
        component,
        ComponentStatus::Machine(from),
        ComponentStatus::Machine(to),
    )
}

pub(crate) fn unhandled_transport(
    origin: Origin,
    component: ComponentId,
    from: TransportStatus,
    to: TransportStatus,
) -> SimError {
    unhandled(
        origin,
        component,
        ComponentStatus::Transport(from),
        ComponentStatus::Transport(to),
    )
}

/// Move `job` from buffer `from` to buffer `to`, keeping store, status, and
/// the job's location in sync.
pub(crate) fn move_job(
    instance: &InstanceConfig,
    state: &mut State,
    job: JobId,
    from: BufferId,
    to: BufferId,
) -> Result<(), InvariantViolation> {
    let from_config = instance.buffer(from)?;
    let to_config = instance.buffer(to)?;
    state
        .buffer_mut(from)
        .ok_or(InvariantViolation::UnknownComponent(from.into()))?
        .remove(from_config, job)?;
    state
        .buffer_mut(to)
        .ok_or(InvariantViolation::UnknownComponent(to.into()))?
        .push(to_config, job)?;
    state.job_mut(job)?.location = to;
    Ok(())
}

/// Reject unless the component's timer has run out.
pub(crate) fn ensure_elapsed(
    component: ComponentId,
    occupied_until: Option<Time>,
    now: Time,
) -> Result<(), Rejection> {
    match occupied_until {
        Some(until) if until > now => Err(Rejection::Busy { component, until }),
        _ => Ok(()),
    }
}
