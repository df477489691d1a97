//! What a controller may request next.
//!
//! Offers are listed machine setups first, then transport assignments, each
//! ordered by job priority (highest first) and then declaration order.

use crate::error::{InvariantViolation, Rejection, SimError};
use crate::id::{BufferId, JobId, Location};
use crate::instance::{InstanceConfig, TransportType};
use crate::state::{BufferSlot, MachineStatus, State, TransportStatus};
use crate::transition::ComponentTransition;

/// Where a movable job is collected and where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub pickup: Location,
    pub dropoff: Location,
}

/// The trip a transport would make for `job`, or `None` if the job is not
/// movable: already assigned, mid-operation, inside a machine or vehicle,
/// already waiting at its next machine, or finished with no output buffer
/// to go to.
pub fn route_for(
    instance: &InstanceConfig,
    state: &State,
    job: JobId,
) -> Result<Option<Route>, InvariantViolation> {
    let j = state.job(job)?;
    if state.assigned_transport(job).is_some() || j.active_operation().is_some() {
        return Ok(None);
    }
    let pickup = match state.locate_buffer(j.location) {
        Some(BufferSlot::Free(b)) => Location::Buffer(b),
        Some(BufferSlot::PostBuffer(m)) => Location::Machine(m),
        Some(_) => return Ok(None),
        None => return Err(InvariantViolation::UnknownComponent(j.location.into())),
    };
    let dropoff = match j.next_operation() {
        Some(op) => Location::Machine(op.machine),
        None => match instance.output_buffer() {
            Some(out) if out.id != j.location => Location::Buffer(out.id),
            _ => return Ok(None),
        },
    };
    Ok(Some(Route { pickup, dropoff }))
}

/// The buffer a transport of `kind` would take `job` from right now.
/// Teleporters ignore buffer policy; everything else needs the job exposed.
pub(crate) fn check_collectable(
    instance: &InstanceConfig,
    state: &State,
    kind: TransportType,
    job: JobId,
) -> Result<BufferId, SimError> {
    let location = state.job(job)?.location;
    match state.locate_buffer(location) {
        Some(BufferSlot::Free(_) | BufferSlot::PostBuffer(_)) => {}
        Some(_) => return Err(Rejection::JobNotMovable { job }.into()),
        None => return Err(InvariantViolation::UnknownComponent(location.into()).into()),
    }
    if kind == TransportType::Teleporter {
        return Ok(location);
    }
    let config = instance.buffer(location)?;
    let exposed = state
        .buffer(location)
        .is_some_and(|b| b.can_release(config.kind, job));
    if exposed {
        Ok(location)
    } else {
        Err(Rejection::NotExposed {
            job,
            buffer: location,
        }
        .into())
    }
}

/// `check_collectable` as a yes/no, keeping invariant violations fatal.
pub(crate) fn is_collectable(
    instance: &InstanceConfig,
    state: &State,
    kind: TransportType,
    job: JobId,
) -> Result<bool, InvariantViolation> {
    match check_collectable(instance, state, kind, job) {
        Ok(_) => Ok(true),
        Err(SimError::Rejected(_)) => Ok(false),
        Err(SimError::Invariant(e)) => Err(e),
    }
}

/// Job ids by descending priority, ties in declaration order.
pub fn jobs_by_priority(instance: &InstanceConfig, state: &State) -> Vec<JobId> {
    let mut ids: Vec<(u32, JobId)> = state
        .jobs
        .iter()
        .map(|j| {
            let priority = instance.job(j.id).map_or(0, |c| c.priority);
            (priority, j.id)
        })
        .collect();
    ids.sort_by(|a, b| b.0.cmp(&a.0));
    ids.into_iter().map(|(_, id)| id).collect()
}

/// Every transition a controller could request in `state`.
pub fn possible_transitions(
    instance: &InstanceConfig,
    state: &State,
) -> Result<Vec<ComponentTransition>, InvariantViolation> {
    let order = jobs_by_priority(instance, state);
    let mut out = Vec::new();

    // Machine setups.
    for job_id in &order {
        let job = state.job(*job_id)?;
        if job.active_operation().is_some() {
            continue;
        }
        let Some(op) = job.next_operation() else {
            continue;
        };
        let config = instance.machine(op.machine)?;
        if job.location != config.prebuffer.id {
            continue;
        }
        let machine = state.machine(op.machine)?;
        if machine.status == MachineStatus::Idle
            && machine.prebuffer.can_release(config.prebuffer.kind, *job_id)
            && machine.buffer.has_space(&config.buffer)
        {
            out.push(ComponentTransition::machine(
                op.machine,
                MachineStatus::Setup,
                Some(*job_id),
            ));
        }
    }

    // Transport assignments.
    if state.transports_en_route() < instance.logistics.capacity as usize {
        let mut movable = Vec::new();
        for job_id in &order {
            if route_for(instance, state, *job_id)?.is_some() {
                movable.push(*job_id);
            }
        }
        for transport in &state.transports {
            if transport.status != TransportStatus::Idle {
                continue;
            }
            let kind = instance.transport(transport.id)?.kind;
            for job_id in &movable {
                if !is_collectable(instance, state, kind, *job_id)? {
                    continue;
                }
                out.push(ComponentTransition::transport(
                    transport.id,
                    TransportStatus::Working,
                    Some(*job_id),
                ));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{MachineId, TransportId};
    use crate::instance::{
        BufferRole, BufferSpec, BufferType, InstanceBuilder, MachineSpec, OperationSpec,
    };
    use crate::test_utils::flow_shop;

    #[test]
    fn initial_offers_are_transport_times_jobs() {
        let instance = flow_shop(&[&[1], &[1]], 2);
        let state = instance.initial_state().unwrap();
        let possible = possible_transitions(&instance, &state).unwrap();
        let expected: Vec<ComponentTransition> = [(0, 0), (0, 1), (1, 0), (1, 1)]
            .iter()
            .map(|(t, j)| {
                ComponentTransition::transport(
                    TransportId(*t),
                    TransportStatus::Working,
                    Some(JobId(*j)),
                )
            })
            .collect();
        assert_eq!(possible, expected);
    }

    #[test]
    fn priority_orders_offers() {
        let mut b = InstanceBuilder::new();
        let input = b.add_buffer(BufferSpec::new(BufferType::Flex, 4), Some(BufferRole::Input));
        let m = b.add_machine(MachineSpec::default());
        b.add_transport(TransportType::Agv, Location::Buffer(input));
        b.add_job(vec![OperationSpec::new(m, 1)], 1);
        b.add_job(vec![OperationSpec::new(m, 1)], 7);
        b.add_job(vec![OperationSpec::new(m, 1)], 1);
        let instance = b.build().unwrap();
        let state = instance.initial_state().unwrap();
        let jobs: Vec<Option<JobId>> = possible_transitions(&instance, &state)
            .unwrap()
            .iter()
            .map(|t| t.job)
            .collect();
        assert_eq!(jobs, vec![Some(JobId(1)), Some(JobId(0)), Some(JobId(2))]);
    }

    #[test]
    fn flex_prebuffer_offers_every_waiting_job() {
        let mut b = InstanceBuilder::new();
        let m = b.add_machine(MachineSpec::default().prebuffer(BufferType::Flex, 4));
        b.add_job(vec![OperationSpec::new(m, 1)], 0);
        b.add_job(vec![OperationSpec::new(m, 1)], 0);
        let instance = b.build().unwrap();
        let state = instance.initial_state().unwrap();
        assert_eq!(
            possible_transitions(&instance, &state).unwrap(),
            vec![
                ComponentTransition::machine(MachineId(0), MachineStatus::Setup, Some(JobId(0))),
                ComponentTransition::machine(MachineId(0), MachineStatus::Setup, Some(JobId(1))),
            ]
        );
    }

    #[test]
    fn fifo_prebuffer_offers_only_its_head() {
        let mut b = InstanceBuilder::new();
        let m = b.add_machine(MachineSpec::default());
        b.add_job(vec![OperationSpec::new(m, 1)], 0);
        b.add_job(vec![OperationSpec::new(m, 1)], 9);
        let instance = b.build().unwrap();
        let state = instance.initial_state().unwrap();
        assert_eq!(
            possible_transitions(&instance, &state).unwrap(),
            vec![ComponentTransition::machine(
                MachineId(0),
                MachineStatus::Setup,
                Some(JobId(0))
            )]
        );
    }

    #[test]
    fn finished_job_needs_an_output_buffer() {
        let instance = flow_shop(&[&[1]], 1);
        let mut state = instance.initial_state().unwrap();
        let post = instance.machines[0].postbuffer.id;
        let input = instance.input_buffer().unwrap().id;
        crate::handlers::move_job(&instance, &mut state, JobId(0), input, post).unwrap();
        state.jobs[0].operations[0].status = crate::state::OperationStatus::Done;
        let out = instance.output_buffer().unwrap().id;
        assert_eq!(
            route_for(&instance, &state, JobId(0)).unwrap(),
            Some(Route {
                pickup: Location::Machine(MachineId(0)),
                dropoff: Location::Buffer(out),
            })
        );

        let mut no_output = instance.clone();
        no_output.buffers.retain(|b| b.role != Some(BufferRole::Output));
        let mut state2 = state.clone();
        state2.buffers.retain(|b| b.id != out);
        assert_eq!(route_for(&no_output, &state2, JobId(0)).unwrap(), None);
    }

    #[test]
    fn assigned_jobs_are_not_offered_again() {
        let instance = flow_shop(&[&[1]], 2);
        let mut state = instance.initial_state().unwrap();
        state.transports[0].job = Some(JobId(0));
        state.transports[0].status = TransportStatus::Pickup;
        assert_eq!(route_for(&instance, &state, JobId(0)).unwrap(), None);
        assert!(possible_transitions(&instance, &state).unwrap().is_empty());
    }

    #[test]
    fn collectability_follows_policy() {
        let mut b = InstanceBuilder::new();
        let input = b.add_buffer(BufferSpec::new(BufferType::Lifo, 4), Some(BufferRole::Input));
        let m = b.add_machine(MachineSpec::default());
        b.add_transport(TransportType::Agv, Location::Buffer(input));
        b.add_job(vec![OperationSpec::new(m, 1)], 0);
        b.add_job(vec![OperationSpec::new(m, 1)], 0);
        let instance = b.build().unwrap();
        let state = instance.initial_state().unwrap();

        assert!(!is_collectable(&instance, &state, TransportType::Agv, JobId(0)).unwrap());
        assert!(is_collectable(&instance, &state, TransportType::Agv, JobId(1)).unwrap());
        assert!(is_collectable(&instance, &state, TransportType::Teleporter, JobId(0)).unwrap());
        assert!(is_collectable(&instance, &state, TransportType::Agv, JobId(5)).is_err());

        assert_eq!(
            possible_transitions(&instance, &state).unwrap(),
            vec![ComponentTransition::transport(
                TransportId(0),
                TransportStatus::Working,
                Some(JobId(1)),
            )]
        );
    }
}
