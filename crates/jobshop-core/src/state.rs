//! Dynamic simulation state.
//!
//! A [`State`] is a plain value: the orchestrator clones it, mutates the
//! clone, and either returns it or throws it away. Every job is stored in
//! exactly one buffer (free-standing, machine-owned, or transport-owned) and
//! its `location` names that buffer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;
use crate::id::*;
use crate::outage::OutageState;
use crate::sim::{StateHash, Time};

// ---------------------------------------------------------------------------
// Operations and jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    Idle,
    Processing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationState {
    pub id: OperationId,
    pub machine: MachineId,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub status: OperationStatus,
}

impl OperationState {
    pub fn new(id: OperationId, machine: MachineId) -> Self {
        Self {
            id,
            machine,
            start_time: None,
            end_time: None,
            status: OperationStatus::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
    pub id: JobId,
    pub operations: Vec<OperationState>,
    /// The buffer currently holding this job.
    pub location: BufferId,
}

impl JobState {
    /// First operation not yet started.
    pub fn next_operation(&self) -> Option<&OperationState> {
        self.operations
            .iter()
            .find(|o| o.status == OperationStatus::Idle)
    }

    pub fn active_operation(&self) -> Option<&OperationState> {
        self.operations
            .iter()
            .find(|o| o.status == OperationStatus::Processing)
    }

    pub(crate) fn operation_mut(&mut self, id: OperationId) -> Option<&mut OperationState> {
        self.operations.iter_mut().find(|o| o.id == id)
    }

    pub fn is_done(&self) -> bool {
        self.operations
            .iter()
            .all(|o| o.status == OperationStatus::Done)
    }

    /// Latest end time among finished operations.
    pub fn completion_time(&self) -> Option<Time> {
        self.operations.iter().filter_map(|o| o.end_time).max()
    }
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferStatus {
    Empty,
    NotEmpty,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferState {
    pub id: BufferId,
    pub status: BufferStatus,
    /// Stored jobs, oldest first.
    pub store: Vec<JobId>,
}

impl BufferState {
    pub fn new(id: BufferId) -> Self {
        Self {
            id,
            status: BufferStatus::Empty,
            store: Vec::new(),
        }
    }

    pub fn contains(&self, job: JobId) -> bool {
        self.store.contains(&job)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Where a buffer sits in the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    Free(BufferId),
    PreBuffer(MachineId),
    Processing(MachineId),
    PostBuffer(MachineId),
    Transport(TransportId),
}

// ---------------------------------------------------------------------------
// Machines and transports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineStatus {
    Idle,
    Setup,
    Working,
    Outage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineState {
    pub id: MachineId,
    pub prebuffer: BufferState,
    pub buffer: BufferState,
    pub postbuffer: BufferState,
    pub status: MachineStatus,
    pub occupied_until: Option<Time>,
    pub mounted_tool: ToolId,
    /// One record per configured outage, in configuration order.
    pub outages: Vec<OutageState>,
}

impl MachineState {
    /// The job in the processing buffer, if any.
    pub fn current_job(&self) -> Option<JobId> {
        self.buffer.store.first().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportStatus {
    Idle,
    /// Request alias: asking an idle transport to work starts a pickup.
    Working,
    Pickup,
    WaitingPickup,
    Transit,
    Outage,
}

impl TransportStatus {
    /// Between accepting a job and delivering it.
    pub fn is_en_route(self) -> bool {
        matches!(
            self,
            TransportStatus::Working
                | TransportStatus::Pickup
                | TransportStatus::WaitingPickup
                | TransportStatus::Transit
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportLocation {
    At(Location),
    /// Set when a job is accepted: where the transport was, where it
    /// collects, and where it delivers.
    EnRoute {
        from: Location,
        pickup: Location,
        dropoff: Location,
    },
}

impl TransportLocation {
    /// Where a new trip would start from.
    pub fn origin(self) -> Location {
        match self {
            TransportLocation::At(l) => l,
            TransportLocation::EnRoute { from, .. } => from,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportState {
    pub id: TransportId,
    pub status: TransportStatus,
    pub buffer: BufferState,
    pub occupied_until: Option<Time>,
    pub location: TransportLocation,
    /// The job assigned to this transport, from acceptance until delivery.
    pub job: Option<JobId>,
    pub outages: Vec<OutageState>,
}

// ---------------------------------------------------------------------------
// Whole-shop state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub time: Time,
    pub jobs: Vec<JobState>,
    pub machines: Vec<MachineState>,
    pub transports: Vec<TransportState>,
    /// Free-standing buffers.
    pub buffers: Vec<BufferState>,
}

impl State {
    pub fn job(&self, id: JobId) -> Result<&JobState, InvariantViolation> {
        self.jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or(InvariantViolation::UnknownJob(id))
    }

    pub fn job_mut(&mut self, id: JobId) -> Result<&mut JobState, InvariantViolation> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(InvariantViolation::UnknownJob(id))
    }

    pub fn machine(&self, id: MachineId) -> Result<&MachineState, InvariantViolation> {
        self.machines
            .iter()
            .find(|m| m.id == id)
            .ok_or(InvariantViolation::UnknownComponent(id.into()))
    }

    pub fn machine_mut(&mut self, id: MachineId) -> Result<&mut MachineState, InvariantViolation> {
        self.machines
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(InvariantViolation::UnknownComponent(id.into()))
    }

    pub fn transport(&self, id: TransportId) -> Result<&TransportState, InvariantViolation> {
        self.transports
            .iter()
            .find(|t| t.id == id)
            .ok_or(InvariantViolation::UnknownComponent(id.into()))
    }

    pub fn transport_mut(
        &mut self,
        id: TransportId,
    ) -> Result<&mut TransportState, InvariantViolation> {
        self.transports
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(InvariantViolation::UnknownComponent(id.into()))
    }

    pub fn buffer(&self, id: BufferId) -> Option<&BufferState> {
        self.buffers
            .iter()
            .chain(
                self.machines
                    .iter()
                    .flat_map(|m| [&m.prebuffer, &m.buffer, &m.postbuffer]),
            )
            .chain(self.transports.iter().map(|t| &t.buffer))
            .find(|b| b.id == id)
    }

    pub fn buffer_mut(&mut self, id: BufferId) -> Option<&mut BufferState> {
        if let Some(b) = self.buffers.iter_mut().find(|b| b.id == id) {
            return Some(b);
        }
        for m in &mut self.machines {
            for b in [&mut m.prebuffer, &mut m.buffer, &mut m.postbuffer] {
                if b.id == id {
                    return Some(b);
                }
            }
        }
        self.transports
            .iter_mut()
            .map(|t| &mut t.buffer)
            .find(|b| b.id == id)
    }

    /// Classify a buffer by its owner.
    pub fn locate_buffer(&self, id: BufferId) -> Option<BufferSlot> {
        if self.buffers.iter().any(|b| b.id == id) {
            return Some(BufferSlot::Free(id));
        }
        for m in &self.machines {
            if m.prebuffer.id == id {
                return Some(BufferSlot::PreBuffer(m.id));
            }
            if m.buffer.id == id {
                return Some(BufferSlot::Processing(m.id));
            }
            if m.postbuffer.id == id {
                return Some(BufferSlot::PostBuffer(m.id));
            }
        }
        self.transports
            .iter()
            .find(|t| t.buffer.id == id)
            .map(|t| BufferSlot::Transport(t.id))
    }

    /// The transport a job is assigned to, if any.
    pub fn assigned_transport(&self, job: JobId) -> Option<TransportId> {
        self.transports
            .iter()
            .find(|t| t.job == Some(job))
            .map(|t| t.id)
    }

    pub fn transports_en_route(&self) -> usize {
        self.transports
            .iter()
            .filter(|t| t.status.is_en_route())
            .count()
    }

    pub fn all_jobs_done(&self) -> bool {
        self.jobs.iter().all(JobState::is_done)
    }

    /// Latest operation end time across all jobs.
    pub fn makespan(&self) -> Option<Time> {
        self.jobs.iter().filter_map(JobState::completion_time).max()
    }

    /// Deterministic FNV-1a digest of the whole dynamic state.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.time);
        for job in &self.jobs {
            h.write_u32(job.id.0);
            h.write_u32(job.location.0);
            for op in &job.operations {
                h.write_u32(op.id.0);
                h.write_u8(op.status as u8);
                h.write_opt_time(op.start_time);
                h.write_opt_time(op.end_time);
            }
        }
        for m in &self.machines {
            h.write_u32(m.id.0);
            h.write_u8(m.status as u8);
            h.write_opt_time(m.occupied_until);
            h.write_u32(m.mounted_tool.0);
            for b in [&m.prebuffer, &m.buffer, &m.postbuffer] {
                hash_buffer(&mut h, b);
            }
            for o in &m.outages {
                o.hash_into(&mut h);
            }
        }
        for t in &self.transports {
            h.write_u32(t.id.0);
            h.write_u8(t.status as u8);
            h.write_opt_time(t.occupied_until);
            hash_location(&mut h, t.location);
            h.write_u32(t.job.map_or(u32::MAX, |j| j.0));
            hash_buffer(&mut h, &t.buffer);
            for o in &t.outages {
                o.hash_into(&mut h);
            }
        }
        for b in &self.buffers {
            hash_buffer(&mut h, b);
        }
        h.finish()
    }
}

fn hash_buffer(h: &mut StateHash, b: &BufferState) {
    h.write_u32(b.id.0);
    h.write_u8(b.status as u8);
    h.write_u32(b.store.len() as u32);
    for j in &b.store {
        h.write_u32(j.0);
    }
}

fn hash_location(h: &mut StateHash, location: TransportLocation) {
    let mut write = |l: Location| match l {
        Location::Machine(m) => {
            h.write_u8(0);
            h.write_u32(m.0);
        }
        Location::Buffer(b) => {
            h.write_u8(1);
            h.write_u32(b.0);
        }
    };
    match location {
        TransportLocation::At(l) => write(l),
        TransportLocation::EnRoute {
            from,
            pickup,
            dropoff,
        } => {
            write(from);
            write(pickup);
            write(dropoff);
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MachineStatus::Idle => "IDLE",
            MachineStatus::Setup => "SETUP",
            MachineStatus::Working => "WORKING",
            MachineStatus::Outage => "OUTAGE",
        })
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportStatus::Idle => "IDLE",
            TransportStatus::Working => "WORKING",
            TransportStatus::Pickup => "PICKUP",
            TransportStatus::WaitingPickup => "WAITINGPICKUP",
            TransportStatus::Transit => "TRANSIT",
            TransportStatus::Outage => "OUTAGE",
        })
    }
}

impl fmt::Display for BufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BufferStatus::Empty => "EMPTY",
            BufferStatus::NotEmpty => "NOTEMPTY",
            BufferStatus::Full => "FULL",
        })
    }
}
