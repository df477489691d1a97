use crate::duration::SampleKind;
use crate::error::{InvariantViolation, Rejection, SimError};
use crate::id::{ComponentId, JobId, Location, TransportId};
use crate::instance::{TransportConfig, TransportType};
use crate::outage;
use crate::possible::{check_collectable, route_for};
use crate::sim::Time;
use crate::state::{State, TransportLocation, TransportStatus};

use super::{Ctx, ensure_elapsed, move_job, unhandled_transport};

pub(super) fn dispatch(
    ctx: &mut Ctx<'_>,
    state: &State,
    id: TransportId,
    from: TransportStatus,
    to: TransportStatus,
    job: Option<JobId>,
) -> Result<State, SimError> {
    use TransportStatus::*;
    match (from, to) {
        (Idle, Working | Pickup) => accept(ctx, state, id, job),
        (Pickup, WaitingPickup) => wait_for_job(state, id, job),
        (Pickup | WaitingPickup, Transit) => collect(ctx, state, id, from, job),
        (Transit, Outage) => deliver(ctx, state, id, job),
        (Outage, Idle) => release(state, id),
        _ => Err(unhandled_transport(ctx.origin, id.into(), from, to)),
    }
}

fn travel(
    ctx: &mut Ctx<'_>,
    config: &TransportConfig,
    from: Location,
    to: Location,
) -> Result<Time, InvariantViolation> {
    if config.kind == TransportType::Teleporter {
        return Ok(0);
    }
    Ok(ctx
        .instance
        .travel_time(from, to)?
        .sample(ctx.sampler, SampleKind::Travel))
}

/// The job this transport is assigned, checked against the one requested.
fn carried_job(state: &State, id: TransportId, requested: Option<JobId>) -> Result<JobId, SimError> {
    let holding = state
        .transport(id)?
        .job
        .ok_or(InvariantViolation::EmptyTransport { transport: id })?;
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

fn route(state: &State, id: TransportId) -> Result<(Location, Location), InvariantViolation> {
    match state.transport(id)?.location {
        TransportLocation::EnRoute {
            pickup, dropoff, ..
        } => Ok((pickup, dropoff)),
        TransportLocation::At(_) => Err(InvariantViolation::NoRoute { transport: id }),
    }
}

/// IDLE -> PICKUP: accept a job and head for it.
fn accept(
    ctx: &mut Ctx<'_>,
    state: &State,
    id: TransportId,
    job: Option<JobId>,
) -> Result<State, SimError> {
    let component = ComponentId::Transport(id);
    let job_id = job.ok_or(Rejection::MissingJob { component })?;
    let config = ctx.instance.transport(id)?;
    let transport = state.transport(id)?;

    if let Some(other) = state.assigned_transport(job_id) {
        return Err(Rejection::JobAlreadyAssigned {
            job: job_id,
            transport: other,
        }
        .into());
    }
    let capacity = ctx.instance.logistics.capacity;
    if state.transports_en_route() >= capacity as usize {
        return Err(Rejection::LogisticsSaturated { capacity }.into());
    }
    let planned = route_for(ctx.instance, state, job_id)?
        .ok_or(Rejection::JobNotMovable { job: job_id })?;
    // An AGV committed to a buried job would wait on it forever.
    check_collectable(ctx.instance, state, config.kind, job_id)?;

    let origin = transport.location.origin();
    let duration = travel(ctx, config, origin, planned.pickup)?;

    let mut next = state.clone();
    let t = next.transport_mut(id)?;
    t.status = TransportStatus::Pickup;
    t.occupied_until = Some(state.time.saturating_add(duration));
    t.location = TransportLocation::EnRoute {
        from: origin,
        pickup: planned.pickup,
        dropoff: planned.dropoff,
    };
    t.job = Some(job_id);
    Ok(next)
}

/// PICKUP -> WAITINGPICKUP: arrived, but the job cannot be collected yet.
fn wait_for_job(state: &State, id: TransportId, job: Option<JobId>) -> Result<State, SimError> {
    let transport = state.transport(id)?;
    ensure_elapsed(id.into(), transport.occupied_until, state.time)?;
    let job_id = carried_job(state, id, job)?;
    let (pickup, dropoff) = route(state, id)?;
    let until = state
        .job(job_id)?
        .active_operation()
        .and_then(|op| op.end_time)
        .filter(|end| *end > state.time);

    let mut next = state.clone();
    let t = next.transport_mut(id)?;
    t.status = TransportStatus::WaitingPickup;
    t.occupied_until = until;
    t.location = TransportLocation::EnRoute {
        from: pickup,
        pickup,
        dropoff,
    };
    Ok(next)
}

/// PICKUP/WAITINGPICKUP -> TRANSIT: load the job and leave for the dropoff.
fn collect(
    ctx: &mut Ctx<'_>,
    state: &State,
    id: TransportId,
    from: TransportStatus,
    job: Option<JobId>,
) -> Result<State, SimError> {
    let config = ctx.instance.transport(id)?;
    let transport = state.transport(id)?;
    ensure_elapsed(id.into(), transport.occupied_until, state.time)?;
    let depart_at = match from {
        TransportStatus::Pickup => transport.occupied_until.unwrap_or(state.time),
        _ => state.time,
    };
    let job_id = carried_job(state, id, job)?;
    let (pickup, dropoff) = route(state, id)?;
    let source = check_collectable(ctx.instance, state, config.kind, job_id)?;
    let duration = travel(ctx, config, pickup, dropoff)?;

    let mut next = state.clone();
    move_job(ctx.instance, &mut next, job_id, source, config.buffer.id)?;
    let t = next.transport_mut(id)?;
    t.status = TransportStatus::Transit;
    t.occupied_until = Some(depart_at.saturating_add(duration));
    t.location = TransportLocation::EnRoute {
        from: pickup,
        pickup,
        dropoff,
    };
    Ok(next)
}

/// TRANSIT -> OUTAGE: unload at the dropoff, then hold for any due outage.
fn deliver(
    ctx: &mut Ctx<'_>,
    state: &State,
    id: TransportId,
    job: Option<JobId>,
) -> Result<State, SimError> {
    let config = ctx.instance.transport(id)?;
    let transport = state.transport(id)?;
    ensure_elapsed(id.into(), transport.occupied_until, state.time)?;
    let arrived = transport.occupied_until.unwrap_or(state.time);
    let job_id = carried_job(state, id, job)?;
    let (_, dropoff) = route(state, id)?;
    let destination = ctx.instance.delivery_buffer(dropoff)?;
    let has_space = state
        .buffer(destination.id)
        .ok_or(InvariantViolation::UnknownComponent(destination.id.into()))?
        .has_space(destination);
    if !has_space {
        return Err(Rejection::BufferFull {
            buffer: destination.id,
        }
        .into());
    }

    let mut next = state.clone();
    move_job(
        ctx.instance,
        &mut next,
        job_id,
        config.buffer.id,
        destination.id,
    )?;
    let t = next.transport_mut(id)?;
    t.job = None;
    t.location = TransportLocation::At(dropoff);
    outage::fire_due(&config.outages, &mut t.outages, arrived, ctx.sampler);
    t.status = TransportStatus::Outage;
    t.occupied_until =
        Some(outage::occupancy(&t.outages).map_or(arrived, |end| end.max(arrived)));
    Ok(next)
}

/// OUTAGE -> IDLE.
fn release(state: &State, id: TransportId) -> Result<State, SimError> {
    let transport = state.transport(id)?;
    ensure_elapsed(id.into(), transport.occupied_until, state.time)?;
    let released_at = transport.occupied_until.unwrap_or(state.time);

    let mut next = state.clone();
    let t = next.transport_mut(id)?;
    outage::release(&mut t.outages, released_at);
    t.status = TransportStatus::Idle;
    t.occupied_until = None;
    Ok(next)
}
