use crate::duration::SampleKind;
use crate::error::{InvariantViolation, Rejection, SimError};
use crate::id::{ComponentId, JobId, MachineId};
use crate::outage;
use crate::setup::setup_duration;
use crate::state::{MachineStatus, OperationStatus, State};

use super::{Ctx, ensure_elapsed, move_job, unhandled_machine};

pub(super) fn dispatch(
    ctx: &mut Ctx<'_>,
    state: &State,
    id: MachineId,
    from: MachineStatus,
    to: MachineStatus,
    job: Option<JobId>,
) -> Result<State, SimError> {
    match (from, to) {
        (MachineStatus::Idle, MachineStatus::Setup) => start_setup(ctx, state, id, job),
        (MachineStatus::Setup, MachineStatus::Working) => start_work(ctx, state, id, job),
        (MachineStatus::Working, MachineStatus::Outage) => finish_work(ctx, state, id, job),
        (MachineStatus::Outage, MachineStatus::Idle) => release(ctx, state, id, job),
        _ => Err(unhandled_machine(ctx.origin, id.into(), from, to)),
    }
}

/// The job in the processing buffer, checked against the one requested.
fn held_job(state: &State, id: MachineId, requested: Option<JobId>) -> Result<JobId, SimError> {
    let holding = state
        .machine(id)?
        .current_job()
        .ok_or(InvariantViolation::EmptyMachine { machine: id })?;
    match requested {
        Some(r) if r != holding => Err(Rejection::JobMismatch {
            component: id.into(),
            holding,
            requested: r,
        }
        .into()),
        _ => Ok(holding),
    }
}

/// IDLE -> SETUP: pull the job from the pre-buffer and mount its tool.
fn start_setup(
    ctx: &mut Ctx<'_>,
    state: &State,
    id: MachineId,
    job: Option<JobId>,
) -> Result<State, SimError> {
    let component = ComponentId::Machine(id);
    let job_id = job.ok_or(Rejection::MissingJob { component })?;
    let config = ctx.instance.machine(id)?;
    let machine = state.machine(id)?;
    let job = state.job(job_id)?;

    if job.location != config.prebuffer.id {
        return Err(Rejection::JobNotAt {
            job: job_id,
            expected: config.prebuffer.id,
            actual: job.location,
        }
        .into());
    }
    if job.active_operation().is_some() {
        return Err(Rejection::OperationInProgress { job: job_id }.into());
    }
    let op = job
        .next_operation()
        .ok_or(Rejection::JobFinished { job: job_id })?;
    if op.machine != id {
        return Err(Rejection::WrongMachine {
            job: job_id,
            machine: id,
            expected: op.machine,
        }
        .into());
    }
    if !machine.prebuffer.can_release(config.prebuffer.kind, job_id) {
        return Err(Rejection::NotExposed {
            job: job_id,
            buffer: config.prebuffer.id,
        }
        .into());
    }
    if !machine.buffer.has_space(&config.buffer) {
        return Err(Rejection::BufferFull {
            buffer: config.buffer.id,
        }
        .into());
    }

    let tool = ctx.instance.operation(job_id, op.id)?.tool;
    let setup = setup_duration(config, machine.mounted_tool, tool, ctx.sampler);

    let mut next = state.clone();
    move_job(
        ctx.instance,
        &mut next,
        job_id,
        config.prebuffer.id,
        config.buffer.id,
    )?;
    let m = next.machine_mut(id)?;
    m.status = MachineStatus::Setup;
    m.occupied_until = Some(state.time.saturating_add(setup));
    m.mounted_tool = tool;
    Ok(next)
}

/// SETUP -> WORKING: the operation starts when setup ended.
fn start_work(
    ctx: &mut Ctx<'_>,
    state: &State,
    id: MachineId,
    job: Option<JobId>,
) -> Result<State, SimError> {
    let machine = state.machine(id)?;
    ensure_elapsed(id.into(), machine.occupied_until, state.time)?;
    let job_id = held_job(state, id, job)?;
    let op = state
        .job(job_id)?
        .next_operation()
        .ok_or(Rejection::JobFinished { job: job_id })?;
    let op_id = op.id;
    if op.machine != id {
        return Err(Rejection::WrongMachine {
            job: job_id,
            machine: id,
            expected: op.machine,
        }
        .into());
    }

    let start = machine.occupied_until.unwrap_or(state.time);
    let duration = ctx
        .instance
        .operation(job_id, op_id)?
        .duration
        .sample(ctx.sampler, SampleKind::Processing);
    let end = start.saturating_add(duration);

    let mut next = state.clone();
    let m = next.machine_mut(id)?;
    m.status = MachineStatus::Working;
    m.occupied_until = Some(end);
    let op = next
        .job_mut(job_id)?
        .operation_mut(op_id)
        .ok_or(InvariantViolation::UnknownOperation {
            job: job_id,
            operation: op_id,
        })?;
    op.status = OperationStatus::Processing;
    op.start_time = Some(start);
    op.end_time = Some(end);
    Ok(next)
}

/// WORKING -> OUTAGE: processing is over; hold the job while any due
/// outage runs. With nothing due the hold has zero length.
fn finish_work(
    ctx: &mut Ctx<'_>,
    state: &State,
    id: MachineId,
    job: Option<JobId>,
) -> Result<State, SimError> {
    let config = ctx.instance.machine(id)?;
    let machine = state.machine(id)?;
    ensure_elapsed(id.into(), machine.occupied_until, state.time)?;
    held_job(state, id, job)?;
    let finished_at = machine.occupied_until.unwrap_or(state.time);

    let mut next = state.clone();
    let m = next.machine_mut(id)?;
    outage::fire_due(&config.outages, &mut m.outages, finished_at, ctx.sampler);
    m.status = MachineStatus::Outage;
    m.occupied_until = Some(
        outage::occupancy(&m.outages).map_or(finished_at, |end| end.max(finished_at)),
    );
    Ok(next)
}

/// OUTAGE -> IDLE: end outages and release the held job to the post-buffer.
/// Its operation ends now.
fn release(
    ctx: &mut Ctx<'_>,
    state: &State,
    id: MachineId,
    job: Option<JobId>,
) -> Result<State, SimError> {
    let config = ctx.instance.machine(id)?;
    let machine = state.machine(id)?;
    ensure_elapsed(id.into(), machine.occupied_until, state.time)?;
    let released_at = machine.occupied_until.unwrap_or(state.time);
    let held = match machine.current_job() {
        Some(_) => Some(held_job(state, id, job)?),
        None => None,
    };
    if held.is_some() && !machine.postbuffer.has_space(&config.postbuffer) {
        return Err(Rejection::BufferFull {
            buffer: config.postbuffer.id,
        }
        .into());
    }

    let mut next = state.clone();
    if let Some(job_id) = held {
        move_job(
            ctx.instance,
            &mut next,
            job_id,
            config.buffer.id,
            config.postbuffer.id,
        )?;
        let job = next.job_mut(job_id)?;
        let op = job
            .operations
            .iter_mut()
            .find(|o| o.status == OperationStatus::Processing && o.machine == id)
            .ok_or(InvariantViolation::EmptyMachine { machine: id })?;
        op.status = OperationStatus::Done;
        op.end_time = Some(released_at);
    }
    let m = next.machine_mut(id)?;
    outage::release(&mut m.outages, released_at);
    m.status = MachineStatus::Idle;
    m.occupied_until = None;
    Ok(next)
}
