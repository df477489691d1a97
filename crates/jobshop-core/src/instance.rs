//! Static description of a job shop.
//!
//! An [`InstanceConfig`] is immutable once built: machines, transports,
//! buffers, jobs, and travel times never change during a simulation. It is
//! produced either by [`InstanceBuilder`] or by deserializing a compiled
//! bundle and calling [`InstanceConfig::validate`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::duration::DurationSource;
use crate::error::InvariantViolation;
use crate::id::*;
use crate::outage::OutageState;
use crate::sim::Time;
use crate::state::{
    BufferState, JobState, MachineState, MachineStatus, OperationState, State, TransportLocation,
    TransportState, TransportStatus,
};

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Which stored job a buffer offers without being told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferType {
    Fifo,
    Lifo,
    /// Offers nothing automatically; jobs must be named explicitly.
    Flex,
    Dummy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferRole {
    /// Where jobs start.
    Input,
    /// Where finished jobs are delivered.
    Output,
    Component,
    Compensation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    pub id: BufferId,
    pub kind: BufferType,
    pub capacity: u32,
    pub parent: Option<ComponentId>,
    pub role: Option<BufferRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutageKind {
    Maintenance,
    Failure,
    Recharge,
}

/// An outage fires once at least `frequency` time has passed since the
/// previous one ended, and then lasts `duration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageConfig {
    pub kind: OutageKind,
    pub frequency: DurationSource,
    pub duration: DurationSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupTime {
    pub from: ToolId,
    pub to: ToolId,
    pub duration: DurationSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub id: MachineId,
    pub outages: Vec<OutageConfig>,
    /// Tool changes not listed here take no time.
    pub setup_times: Vec<SetupTime>,
    pub initial_tool: ToolId,
    pub prebuffer: BufferConfig,
    pub buffer: BufferConfig,
    pub postbuffer: BufferConfig,
    pub batches: u32,
}

impl MachineConfig {
    pub fn setup_time(&self, from: ToolId, to: ToolId) -> Option<&DurationSource> {
        self.setup_times
            .iter()
            .find(|s| s.from == from && s.to == to)
            .map(|s| &s.duration)
    }

    pub fn owns_buffer(&self, buffer: BufferId) -> bool {
        [self.prebuffer.id, self.buffer.id, self.postbuffer.id].contains(&buffer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    Agv,
    /// Zero travel time; collects regardless of buffer policy.
    Teleporter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub id: TransportId,
    pub kind: TransportType,
    pub outages: Vec<OutageConfig>,
    pub buffer: BufferConfig,
    pub start: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationConfig {
    pub id: OperationId,
    pub machine: MachineId,
    pub duration: DurationSource,
    pub tool: ToolId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub id: JobId,
    pub operations: Vec<OperationConfig>,
    /// Higher runs first when offers are ordered.
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelTime {
    pub from: Location,
    pub to: Location,
    pub duration: DurationSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogisticsConfig {
    /// Maximum number of transports en route at once.
    pub capacity: u32,
    pub travel_times: Vec<TravelTime>,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            capacity: u32::MAX,
            travel_times: Vec::new(),
        }
    }
}

/// The complete static description of a job shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub machines: Vec<MachineConfig>,
    pub transports: Vec<TransportConfig>,
    /// Free-standing buffers. Machine and transport buffers live on their owners.
    pub buffers: Vec<BufferConfig>,
    pub jobs: Vec<JobConfig>,
    pub logistics: LogisticsConfig,
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

impl InstanceConfig {
    pub fn machine(&self, id: MachineId) -> Result<&MachineConfig, InvariantViolation> {
        self.machines
            .iter()
            .find(|m| m.id == id)
            .ok_or(InvariantViolation::UnknownComponent(id.into()))
    }

    pub fn transport(&self, id: TransportId) -> Result<&TransportConfig, InvariantViolation> {
        self.transports
            .iter()
            .find(|t| t.id == id)
            .ok_or(InvariantViolation::UnknownComponent(id.into()))
    }

    pub fn job(&self, id: JobId) -> Result<&JobConfig, InvariantViolation> {
        self.jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or(InvariantViolation::UnknownJob(id))
    }

    pub fn operation(
        &self,
        job: JobId,
        operation: OperationId,
    ) -> Result<&OperationConfig, InvariantViolation> {
        self.job(job)?
            .operations
            .iter()
            .find(|o| o.id == operation)
            .ok_or(InvariantViolation::UnknownOperation { job, operation })
    }

    /// Every buffer in the instance: free-standing first, then machine
    /// buffers, then transport buffers.
    pub fn all_buffers(&self) -> impl Iterator<Item = &BufferConfig> {
        self.buffers
            .iter()
            .chain(
                self.machines
                    .iter()
                    .flat_map(|m| [&m.prebuffer, &m.buffer, &m.postbuffer]),
            )
            .chain(self.transports.iter().map(|t| &t.buffer))
    }

    pub fn buffer(&self, id: BufferId) -> Result<&BufferConfig, InvariantViolation> {
        self.all_buffers()
            .find(|b| b.id == id)
            .ok_or(InvariantViolation::UnknownComponent(id.into()))
    }

    pub fn buffer_with_role(&self, role: BufferRole) -> Option<&BufferConfig> {
        self.buffers.iter().find(|b| b.role == Some(role))
    }

    pub fn input_buffer(&self) -> Option<&BufferConfig> {
        self.buffer_with_role(BufferRole::Input)
    }

    pub fn output_buffer(&self) -> Option<&BufferConfig> {
        self.buffer_with_role(BufferRole::Output)
    }

    /// The buffer a job lands in when delivered to `location`.
    pub fn delivery_buffer(&self, location: Location) -> Result<&BufferConfig, InvariantViolation> {
        match location {
            Location::Machine(m) => Ok(&self.machine(m)?.prebuffer),
            Location::Buffer(b) => self.buffer(b),
        }
    }

    /// Configured travel duration between two locations. Staying put is free.
    pub fn travel_time(
        &self,
        from: Location,
        to: Location,
    ) -> Result<DurationSource, InvariantViolation> {
        if from == to {
            return Ok(DurationSource::Fixed(0));
        }
        self.logistics
            .travel_times
            .iter()
            .find(|t| t.from == from && t.to == to)
            .map(|t| t.duration.clone())
            .ok_or(InvariantViolation::MissingTravelTime { from, to })
    }

    pub fn job_priority(&self, id: JobId) -> Result<u32, InvariantViolation> {
        Ok(self.job(id)?.priority)
    }

    /// Lower bound on the makespan: the longest job measured in nominal
    /// processing time alone.
    pub fn nominal_lower_bound(&self) -> Time {
        self.jobs
            .iter()
            .map(|j| j.operations.iter().map(|o| o.duration.nominal()).sum())
            .max()
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl InstanceConfig {
    /// Check referential integrity. Travel-time coverage is not checked here;
    /// a missing pair surfaces when a transport first needs it.
    pub fn validate(&self) -> Result<(), InstanceError> {
        let mut buffer_ids = HashSet::new();
        for b in self.all_buffers() {
            if !buffer_ids.insert(b.id) {
                return Err(InstanceError::DuplicateBuffer(b.id));
            }
            if b.capacity == 0 {
                return Err(InstanceError::ZeroCapacity(b.id));
            }
        }
        for b in &self.buffers {
            if b.parent.is_some() {
                return Err(InstanceError::BufferParentMismatch { buffer: b.id });
            }
        }
        for role in [BufferRole::Input, BufferRole::Output] {
            if self.buffers.iter().filter(|b| b.role == Some(role)).count() > 1 {
                return Err(InstanceError::DuplicateRole(role));
            }
        }

        let mut machine_ids = HashSet::new();
        for m in &self.machines {
            if !machine_ids.insert(m.id) {
                return Err(InstanceError::DuplicateComponent(m.id.into()));
            }
            for b in [&m.prebuffer, &m.buffer, &m.postbuffer] {
                if b.parent != Some(ComponentId::Machine(m.id)) {
                    return Err(InstanceError::BufferParentMismatch { buffer: b.id });
                }
            }
            if m.batches == 0 {
                return Err(InstanceError::ZeroBatches(m.id));
            }
            check_outages(&m.outages, m.id.into())?;
            for s in &m.setup_times {
                check_source(&s.duration, || format!("setup {}->{} on {}", s.from, s.to, m.id))?;
            }
        }

        let mut transport_ids = HashSet::new();
        for t in &self.transports {
            if !transport_ids.insert(t.id) {
                return Err(InstanceError::DuplicateComponent(t.id.into()));
            }
            if t.buffer.parent != Some(ComponentId::Transport(t.id)) {
                return Err(InstanceError::BufferParentMismatch { buffer: t.buffer.id });
            }
            self.check_location(t.start)?;
            check_outages(&t.outages, t.id.into())?;
        }

        let mut job_ids = HashSet::new();
        let mut operation_ids = HashSet::new();
        for j in &self.jobs {
            if !job_ids.insert(j.id) {
                return Err(InstanceError::DuplicateJob(j.id));
            }
            if j.operations.is_empty() {
                return Err(InstanceError::EmptyJob(j.id));
            }
            for op in &j.operations {
                if !operation_ids.insert(op.id) {
                    return Err(InstanceError::DuplicateOperation(op.id));
                }
                if !machine_ids.contains(&op.machine) {
                    return Err(InstanceError::UnknownMachine {
                        operation: op.id,
                        machine: op.machine,
                    });
                }
                check_source(&op.duration, || format!("{} of {}", op.id, j.id))?;
            }
        }

        if self.logistics.capacity == 0 && !self.transports.is_empty() {
            return Err(InstanceError::ZeroLogisticsCapacity);
        }
        for t in &self.logistics.travel_times {
            self.check_location(t.from)?;
            self.check_location(t.to)?;
            check_source(&t.duration, || format!("travel {}->{}", t.from, t.to))?;
        }
        Ok(())
    }

    fn check_location(&self, location: Location) -> Result<(), InstanceError> {
        let known = match location {
            Location::Machine(m) => self.machines.iter().any(|c| c.id == m),
            Location::Buffer(b) => self.buffers.iter().any(|c| c.id == b),
        };
        if known {
            Ok(())
        } else {
            Err(InstanceError::UnknownLocation(location))
        }
    }
}

fn check_outages(outages: &[OutageConfig], owner: ComponentId) -> Result<(), InstanceError> {
    for (i, o) in outages.iter().enumerate() {
        check_source(&o.frequency, || format!("outage {i} frequency on {owner}"))?;
        check_source(&o.duration, || format!("outage {i} duration on {owner}"))?;
    }
    Ok(())
}

fn check_source(
    source: &DurationSource,
    context: impl FnOnce() -> String,
) -> Result<(), InstanceError> {
    match source {
        DurationSource::Stochastic(d) if d.is_empty() => {
            Err(InstanceError::EmptyDistribution(context()))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Initial state
// ---------------------------------------------------------------------------

impl InstanceConfig {
    /// The default starting point: time zero, every component idle, jobs
    /// queued in the input buffer (or, without one, in the pre-buffer of the
    /// machine running their first operation) in declaration order.
    pub fn initial_state(&self) -> Result<State, InstanceError> {
        let machines: Vec<MachineState> = self
            .machines
            .iter()
            .map(|m| MachineState {
                id: m.id,
                prebuffer: BufferState::new(m.prebuffer.id),
                buffer: BufferState::new(m.buffer.id),
                postbuffer: BufferState::new(m.postbuffer.id),
                status: MachineStatus::Idle,
                occupied_until: None,
                mounted_tool: m.initial_tool,
                outages: vec![OutageState::default(); m.outages.len()],
            })
            .collect();
        let transports = self
            .transports
            .iter()
            .map(|t| TransportState {
                id: t.id,
                status: TransportStatus::Idle,
                buffer: BufferState::new(t.buffer.id),
                occupied_until: None,
                location: TransportLocation::At(t.start),
                job: None,
                outages: vec![OutageState::default(); t.outages.len()],
            })
            .collect();
        let buffers = self.buffers.iter().map(|b| BufferState::new(b.id)).collect();

        let mut state = State {
            time: 0,
            jobs: Vec::with_capacity(self.jobs.len()),
            machines,
            transports,
            buffers,
        };

        let input = self.input_buffer().map(|b| b.id);
        for job in &self.jobs {
            let location = match (input, job.operations.first()) {
                (Some(b), _) => b,
                (None, Some(op)) => self
                    .machine(op.machine)
                    .map_err(|_| InstanceError::UnknownMachine {
                        operation: op.id,
                        machine: op.machine,
                    })?
                    .prebuffer
                    .id,
                (None, None) => return Err(InstanceError::EmptyJob(job.id)),
            };
            let config = self
                .buffer(location)
                .map_err(|_| InstanceError::NoStartingBuffer(job.id))?;
            let store = state
                .buffer_mut(location)
                .ok_or(InstanceError::NoStartingBuffer(job.id))?;
            if store.push(config, job.id).is_err() {
                return Err(InstanceError::InitialOverflow {
                    buffer: location,
                    capacity: config.capacity,
                });
            }
            state.jobs.push(JobState {
                id: job.id,
                operations: job
                    .operations
                    .iter()
                    .map(|op| OperationState::new(op.id, op.machine))
                    .collect(),
                location,
            });
        }
        Ok(state)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Buffer settings used when the builder creates a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSpec {
    pub kind: BufferType,
    pub capacity: u32,
}

impl BufferSpec {
    pub const fn new(kind: BufferType, capacity: u32) -> Self {
        Self { kind, capacity }
    }

    pub const UNBOUNDED_FIFO: Self = Self::new(BufferType::Fifo, u32::MAX);
}

#[derive(Debug, Clone)]
pub struct MachineSpec {
    pub prebuffer: BufferSpec,
    pub postbuffer: BufferSpec,
    /// Capacity of the processing buffer.
    pub batches: u32,
    pub initial_tool: ToolId,
}

impl Default for MachineSpec {
    fn default() -> Self {
        Self {
            prebuffer: BufferSpec::UNBOUNDED_FIFO,
            postbuffer: BufferSpec::UNBOUNDED_FIFO,
            batches: 1,
            initial_tool: ToolId(0),
        }
    }
}

impl MachineSpec {
    pub fn prebuffer(mut self, kind: BufferType, capacity: u32) -> Self {
        self.prebuffer = BufferSpec::new(kind, capacity);
        self
    }

    pub fn postbuffer(mut self, kind: BufferType, capacity: u32) -> Self {
        self.postbuffer = BufferSpec::new(kind, capacity);
        self
    }
}

/// One operation of a job under construction.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub machine: MachineId,
    pub duration: DurationSource,
    pub tool: ToolId,
}

impl OperationSpec {
    pub fn new(machine: MachineId, duration: impl Into<DurationSource>) -> Self {
        Self {
            machine,
            duration: duration.into(),
            tool: ToolId(0),
        }
    }

    pub fn with_tool(mut self, tool: ToolId) -> Self {
        self.tool = tool;
        self
    }
}

/// Builder for an immutable [`InstanceConfig`].
/// Two phases: registration (ids handed out in order), then `build()`.
#[derive(Debug, Default)]
pub struct InstanceBuilder {
    machines: Vec<MachineConfig>,
    transports: Vec<TransportConfig>,
    buffers: Vec<BufferConfig>,
    jobs: Vec<JobConfig>,
    logistics: LogisticsConfig,
    next_buffer: u32,
    next_operation: u32,
}

impl InstanceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer_config(
        &mut self,
        spec: BufferSpec,
        parent: Option<ComponentId>,
        role: Option<BufferRole>,
    ) -> BufferConfig {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        BufferConfig {
            id,
            kind: spec.kind,
            capacity: spec.capacity,
            parent,
            role,
        }
    }

    /// Register a free-standing buffer. Returns its ID.
    pub fn add_buffer(&mut self, spec: BufferSpec, role: Option<BufferRole>) -> BufferId {
        let config = self.buffer_config(spec, None, role);
        let id = config.id;
        self.buffers.push(config);
        id
    }

    /// Register a machine together with its three buffers. Returns its ID.
    pub fn add_machine(&mut self, spec: MachineSpec) -> MachineId {
        let id = MachineId(self.machines.len() as u32);
        let parent = Some(ComponentId::Machine(id));
        let role = Some(BufferRole::Component);
        let prebuffer = self.buffer_config(spec.prebuffer, parent, role);
        let buffer = self.buffer_config(
            BufferSpec::new(BufferType::Dummy, spec.batches),
            parent,
            role,
        );
        let postbuffer = self.buffer_config(spec.postbuffer, parent, role);
        self.machines.push(MachineConfig {
            id,
            outages: Vec::new(),
            setup_times: Vec::new(),
            initial_tool: spec.initial_tool,
            prebuffer,
            buffer,
            postbuffer,
            batches: spec.batches,
        });
        id
    }

    /// Register a transport parked at `start`. Returns its ID.
    pub fn add_transport(&mut self, kind: TransportType, start: Location) -> TransportId {
        let id = TransportId(self.transports.len() as u32);
        let buffer = self.buffer_config(
            BufferSpec::new(BufferType::Dummy, 1),
            Some(ComponentId::Transport(id)),
            Some(BufferRole::Component),
        );
        self.transports.push(TransportConfig {
            id,
            kind,
            outages: Vec::new(),
            buffer,
            start,
        });
        id
    }

    /// Register a job. Operation ids are assigned instance-wide.
    pub fn add_job(&mut self, operations: Vec<OperationSpec>, priority: u32) -> JobId {
        let id = JobId(self.jobs.len() as u32);
        let operations = operations
            .into_iter()
            .map(|spec| {
                let op = OperationConfig {
                    id: OperationId(self.next_operation),
                    machine: spec.machine,
                    duration: spec.duration,
                    tool: spec.tool,
                };
                self.next_operation += 1;
                op
            })
            .collect();
        self.jobs.push(JobConfig {
            id,
            operations,
            priority,
        });
        id
    }

    pub fn add_outage(
        &mut self,
        component: ComponentId,
        outage: OutageConfig,
    ) -> Result<(), InstanceError> {
        match component {
            ComponentId::Machine(id) => self
                .machines
                .get_mut(id.0 as usize)
                .ok_or(InstanceError::NotFound(component))?
                .outages
                .push(outage),
            ComponentId::Transport(id) => self
                .transports
                .get_mut(id.0 as usize)
                .ok_or(InstanceError::NotFound(component))?
                .outages
                .push(outage),
            ComponentId::Buffer(_) => return Err(InstanceError::NotFound(component)),
        }
        Ok(())
    }

    pub fn add_setup_time(
        &mut self,
        machine: MachineId,
        from: ToolId,
        to: ToolId,
        duration: impl Into<DurationSource>,
    ) -> Result<(), InstanceError> {
        self.machines
            .get_mut(machine.0 as usize)
            .ok_or(InstanceError::NotFound(machine.into()))?
            .setup_times
            .push(SetupTime {
                from,
                to,
                duration: duration.into(),
            });
        Ok(())
    }

    /// Set (or replace) the one-way travel time from `from` to `to`.
    pub fn set_travel_time(
        &mut self,
        from: Location,
        to: Location,
        duration: impl Into<DurationSource>,
    ) {
        let duration = duration.into();
        let times = &mut self.logistics.travel_times;
        match times.iter_mut().find(|t| t.from == from && t.to == to) {
            Some(existing) => existing.duration = duration,
            None => times.push(TravelTime { from, to, duration }),
        }
    }

    pub fn set_symmetric_travel_time(
        &mut self,
        a: Location,
        b: Location,
        duration: impl Into<DurationSource>,
    ) {
        let duration = duration.into();
        self.set_travel_time(a, b, duration.clone());
        self.set_travel_time(b, a, duration);
    }

    pub fn set_logistics_capacity(&mut self, capacity: u32) {
        self.logistics.capacity = capacity;
    }

    /// Every location a transport can visit, in registration order.
    pub fn locations(&self) -> Vec<Location> {
        self.machines
            .iter()
            .map(|m| Location::Machine(m.id))
            .chain(self.buffers.iter().map(|b| Location::Buffer(b.id)))
            .collect()
    }

    /// Finalize into an immutable instance.
    pub fn build(self) -> Result<InstanceConfig, InstanceError> {
        let instance = InstanceConfig {
            machines: self.machines,
            transports: self.transports,
            buffers: self.buffers,
            jobs: self.jobs,
            logistics: self.logistics,
        };
        instance.validate()?;
        Ok(instance)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstanceError {
    #[error("component not found: {0}")]
    NotFound(ComponentId),
    #[error("duplicate component id: {0}")]
    DuplicateComponent(ComponentId),
    #[error("duplicate buffer id: {0}")]
    DuplicateBuffer(BufferId),
    #[error("duplicate job id: {0}")]
    DuplicateJob(JobId),
    #[error("duplicate operation id: {0}")]
    DuplicateOperation(OperationId),
    #[error("{operation} references unknown machine {machine}")]
    UnknownMachine {
        operation: OperationId,
        machine: MachineId,
    },
    #[error("unknown location: {0}")]
    UnknownLocation(Location),
    #[error("{buffer} has the wrong parent component")]
    BufferParentMismatch { buffer: BufferId },
    #[error("{0} has zero capacity")]
    ZeroCapacity(BufferId),
    #[error("{0} has zero batches")]
    ZeroBatches(MachineId),
    #[error("more than one buffer has role {0:?}")]
    DuplicateRole(BufferRole),
    #[error("{0} has no operations")]
    EmptyJob(JobId),
    #[error("logistics capacity is zero but transports exist")]
    ZeroLogisticsCapacity,
    #[error("empty distribution for {0}")]
    EmptyDistribution(String),
    #[error("no starting buffer for {0}")]
    NoStartingBuffer(JobId),
    #[error("initial jobs overflow {buffer} (capacity {capacity})")]
    InitialOverflow { buffer: BufferId, capacity: u32 },
}
