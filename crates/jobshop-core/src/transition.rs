//! Transition requests.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{ComponentId, JobId, MachineId, TransportId};
use crate::state::{BufferStatus, MachineStatus, TransportStatus};

/// A lifecycle tag of any component kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentStatus {
    Machine(MachineStatus),
    Transport(TransportStatus),
    Buffer(BufferStatus),
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentStatus::Machine(s) => s.fmt(f),
            ComponentStatus::Transport(s) => s.fmt(f),
            ComponentStatus::Buffer(s) => s.fmt(f),
        }
    }
}

/// Move one component to a target lifecycle state, optionally naming the
/// job involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentTransition {
    pub component: ComponentId,
    pub target: ComponentStatus,
    pub job: Option<JobId>,
}

impl ComponentTransition {
    pub fn machine(id: MachineId, target: MachineStatus, job: Option<JobId>) -> Self {
        Self {
            component: id.into(),
            target: ComponentStatus::Machine(target),
            job,
        }
    }

    pub fn transport(id: TransportId, target: TransportStatus, job: Option<JobId>) -> Self {
        Self {
            component: id.into(),
            target: ComponentStatus::Transport(target),
            job,
        }
    }

    /// Application order within a tick: transports, then machines, then
    /// anything else.
    fn rank(&self) -> u8 {
        match self.component {
            ComponentId::Transport(_) => 0,
            ComponentId::Machine(_) => 1,
            ComponentId::Buffer(_) => 2,
        }
    }
}

impl fmt::Display for ComponentTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.component, self.target)?;
        if let Some(job) = self.job {
            write!(f, " ({job})")?;
        }
        Ok(())
    }
}

/// Stable sort putting transport transitions before machine transitions.
/// Within a kind the caller's order is kept.
pub fn sort_for_application(transitions: &mut [ComponentTransition]) {
    transitions.sort_by_key(ComponentTransition::rank);
}
