//! Transitions caused purely by elapsed time.
//!
//! Transports are resolved before machines so a job delivered this tick can
//! start on its machine in the same tick. Each component is re-examined
//! until nothing more is due, which folds zero-duration steps (teleports,
//! empty outage holds, zero-length setups) into one batch.

use tracing::trace;

use crate::duration::DurationSampler;
use crate::error::{InvariantViolation, SimError};
use crate::handlers::apply_timed_transition;
use crate::id::{MachineId, TransportId};
use crate::instance::InstanceConfig;
use crate::possible::is_collectable;
use crate::sim::Time;
use crate::state::{MachineStatus, State, TransportLocation, TransportStatus};
use crate::transition::ComponentTransition;

fn elapsed(occupied_until: Option<Time>, now: Time) -> bool {
    occupied_until.is_none_or(|t| t <= now)
}

/// The transition `transport` makes on its own at the current time, if any.
pub fn due_for_transport(
    instance: &InstanceConfig,
    state: &State,
    id: TransportId,
) -> Result<Option<ComponentTransition>, InvariantViolation> {
    let t = state.transport(id)?;
    let now = state.time;
    let config = instance.transport(id)?;
    let next = match t.status {
        TransportStatus::Idle | TransportStatus::Working => None,
        TransportStatus::Pickup | TransportStatus::WaitingPickup => {
            if !elapsed(t.occupied_until, now) {
                None
            } else {
                let job = t.job.ok_or(InvariantViolation::EmptyTransport { transport: id })?;
                if is_collectable(instance, state, config.kind, job)? {
                    Some(TransportStatus::Transit)
                } else if t.status == TransportStatus::Pickup {
                    Some(TransportStatus::WaitingPickup)
                } else {
                    None
                }
            }
        }
        TransportStatus::Transit => {
            if !elapsed(t.occupied_until, now) {
                None
            } else {
                let TransportLocation::EnRoute { dropoff, .. } = t.location else {
                    return Err(InvariantViolation::NoRoute { transport: id });
                };
                let dest = instance.delivery_buffer(dropoff)?;
                let has_space = state
                    .buffer(dest.id)
                    .ok_or(InvariantViolation::UnknownComponent(dest.id.into()))?
                    .has_space(dest);
                has_space.then_some(TransportStatus::Outage)
            }
        }
        TransportStatus::Outage => {
            elapsed(t.occupied_until, now).then_some(TransportStatus::Idle)
        }
    };
    Ok(next.map(|status| ComponentTransition::transport(id, status, t.job)))
}

/// The transition `machine` makes on its own at the current time, if any.
pub fn due_for_machine(
    instance: &InstanceConfig,
    state: &State,
    id: MachineId,
) -> Result<Option<ComponentTransition>, InvariantViolation> {
    let m = state.machine(id)?;
    let now = state.time;
    let config = instance.machine(id)?;
    let held = m.current_job();
    let next = match m.status {
        MachineStatus::Setup if elapsed(m.occupied_until, now) => {
            Some((MachineStatus::Working, held))
        }
        MachineStatus::Working if elapsed(m.occupied_until, now) => {
            Some((MachineStatus::Outage, held))
        }
        MachineStatus::Outage if elapsed(m.occupied_until, now) => {
            let blocked = held.is_some() && !m.postbuffer.has_space(&config.postbuffer);
            (!blocked).then_some((MachineStatus::Idle, held))
        }
        MachineStatus::Idle => {
            // Non-FLEX pre-buffers start their exposed job without being asked.
            match m.prebuffer.exposed(config.prebuffer.kind) {
                Some(job_id) if m.buffer.has_space(&config.buffer) => {
                    let job = state.job(job_id)?;
                    let ready = job.active_operation().is_none()
                        && job.next_operation().is_some_and(|op| op.machine == id);
                    ready.then_some((MachineStatus::Setup, Some(job_id)))
                }
                _ => None,
            }
        }
        _ => None,
    };
    Ok(next.map(|(status, job)| ComponentTransition::machine(id, status, job)))
}

/// Every timed transition due in `state`, transports first, without applying
/// any of them.
pub fn due_transitions(
    instance: &InstanceConfig,
    state: &State,
) -> Result<Vec<ComponentTransition>, InvariantViolation> {
    let mut out = Vec::new();
    for t in &state.transports {
        out.extend(due_for_transport(instance, state, t.id)?);
    }
    for m in &state.machines {
        out.extend(due_for_machine(instance, state, m.id)?);
    }
    Ok(out)
}

/// `Some(now)` if something is due immediately, otherwise the earliest
/// future `occupied_until` of any busy component.
pub fn next_event_time(
    instance: &InstanceConfig,
    state: &State,
) -> Result<Option<Time>, InvariantViolation> {
    if !due_transitions(instance, state)?.is_empty() {
        return Ok(Some(state.time));
    }
    let machine_ends = state
        .machines
        .iter()
        .filter(|m| m.status != MachineStatus::Idle)
        .filter_map(|m| m.occupied_until);
    let transport_ends = state
        .transports
        .iter()
        .filter(|t| t.status != TransportStatus::Idle)
        .filter_map(|t| t.occupied_until);
    Ok(machine_ends
        .chain(transport_ends)
        .filter(|t| *t > state.time)
        .min())
}

/// Result of resolving one timed batch.
#[derive(Debug, Clone)]
pub struct TimedBatch {
    pub state: State,
    pub applied: Vec<ComponentTransition>,
    /// State after each applied transition, if recording.
    pub sub_states: Vec<State>,
}

/// Resolve every timed transition due at the current time.
///
/// `budget` bounds the number of transitions applied; running out is an
/// invariant violation, since a finite shop always settles.
pub fn apply_due_transitions(
    instance: &InstanceConfig,
    state: State,
    sampler: &mut dyn DurationSampler,
    budget: usize,
    record: bool,
) -> Result<TimedBatch, SimError> {
    let mut batch = TimedBatch {
        state,
        applied: Vec::new(),
        sub_states: Vec::new(),
    };
    let transports: Vec<TransportId> = batch.state.transports.iter().map(|t| t.id).collect();
    let machines: Vec<MachineId> = batch.state.machines.iter().map(|m| m.id).collect();

    for id in transports {
        while let Some(t) = due_for_transport(instance, &batch.state, id)? {
            apply_one(instance, &mut batch, t, sampler, budget, record)?;
        }
    }
    for id in machines {
        while let Some(t) = due_for_machine(instance, &batch.state, id)? {
            apply_one(instance, &mut batch, t, sampler, budget, record)?;
        }
    }
    Ok(batch)
}

fn apply_one(
    instance: &InstanceConfig,
    batch: &mut TimedBatch,
    transition: ComponentTransition,
    sampler: &mut dyn DurationSampler,
    budget: usize,
    record: bool,
) -> Result<(), SimError> {
    if batch.applied.len() >= budget {
        return Err(InvariantViolation::CascadeLimit {
            limit: budget,
            time: batch.state.time,
        }
        .into());
    }
    trace!(time = batch.state.time, %transition, "timed transition");
    batch.state = apply_timed_transition(instance, &batch.state, &transition, sampler)?;
    batch.applied.push(transition);
    if record {
        batch.sub_states.push(batch.state.clone());
    }
    Ok(())
}
