//! The two error classes of the simulation core.
//!
//! A [`Rejection`] means a transition is not legal right now: the tick that
//! contained it is rolled back and reported as unsuccessful. An
//! [`InvariantViolation`] means the instance or the state is inconsistent;
//! the orchestrator surfaces it as an `Err` and never retries.

use crate::id::{BufferId, ComponentId, JobId, Location, MachineId, OperationId, TransportId};
use crate::sim::Time;
use crate::transition::ComponentStatus;

/// A transition that cannot be applied to the current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("{component} cannot move from {from} to {to}")]
    IllegalTransition {
        component: ComponentId,
        from: ComponentStatus,
        to: ComponentStatus,
    },
    #[error("requested state {target} does not apply to {component}")]
    KindMismatch {
        component: ComponentId,
        target: ComponentStatus,
    },
    #[error("{component} changes state only as a side effect of job moves")]
    NotRequestable { component: ComponentId },
    #[error("transition on {component} must name a job")]
    MissingJob { component: ComponentId },
    #[error("{component} holds {holding}, not {requested}")]
    JobMismatch {
        component: ComponentId,
        holding: JobId,
        requested: JobId,
    },
    #[error("{job} is in {actual}, expected {expected}")]
    JobNotAt {
        job: JobId,
        expected: BufferId,
        actual: BufferId,
    },
    #[error("policy of {buffer} does not expose {job}")]
    NotExposed { job: JobId, buffer: BufferId },
    #[error("{buffer} is full")]
    BufferFull { buffer: BufferId },
    #[error("{component} is occupied until t={until}")]
    Busy { component: ComponentId, until: Time },
    #[error("{job} has an operation in progress")]
    OperationInProgress { job: JobId },
    #[error("{job} has no remaining operation")]
    JobFinished { job: JobId },
    #[error("next operation of {job} runs on {expected}, not {machine}")]
    WrongMachine {
        job: JobId,
        machine: MachineId,
        expected: MachineId,
    },
    #[error("{job} cannot be moved from where it is")]
    JobNotMovable { job: JobId },
    #[error("{job} is already assigned to {transport}")]
    JobAlreadyAssigned { job: JobId, transport: TransportId },
    #[error("all {capacity} logistics slots are in use")]
    LogisticsSaturated { capacity: u32 },
}

/// The instance or the state is inconsistent. Continuing would corrupt the
/// job-conservation invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("unknown component {0}")]
    UnknownComponent(ComponentId),
    #[error("unknown job {0}")]
    UnknownJob(JobId),
    #[error("unknown operation {operation} of {job}")]
    UnknownOperation { job: JobId, operation: OperationId },
    #[error("no travel time configured from {from} to {to}")]
    MissingTravelTime { from: Location, to: Location },
    #[error("no handler for {component} moving from {from} to {to}")]
    UnhandledTransition {
        component: ComponentId,
        from: ComponentStatus,
        to: ComponentStatus,
    },
    #[error("{job} not found in {buffer}")]
    JobNotFound { job: JobId, buffer: BufferId },
    #[error("{buffer} would exceed its capacity of {capacity}")]
    BufferOverflow { buffer: BufferId, capacity: u32 },
    #[error("{machine} has no job in its processing buffer")]
    EmptyMachine { machine: MachineId },
    #[error("{transport} is not carrying a job")]
    EmptyTransport { transport: TransportId },
    #[error("{transport} is running without a route")]
    NoRoute { transport: TransportId },
    #[error("timed transitions did not settle within {limit} iterations at t={time}")]
    CascadeLimit { limit: usize, time: Time },
    #[error("time strategy moved the clock backwards from t={from} to t={to}")]
    TimeReversal { from: Time, to: Time },
}

/// Either error class, so handlers can use `?` on both.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}
