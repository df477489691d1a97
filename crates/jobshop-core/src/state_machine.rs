//! Lifecycle legality for machines, transports, and buffers.
//!
//! Each lifecycle tag collapses to a coarse [`Category`]; a transition is
//! legal when its category pair appears in the component kind's adjacency
//! table. Staying on the same tag is never a transition.

use crate::state::{BufferStatus, MachineStatus, TransportStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Idle,
    Setup,
    Running,
    Outage,
    Full,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Machine,
    Transport,
    Buffer,
}

use Category::*;

const MACHINE_EDGES: &[(Category, Category)] = &[
    (Idle, Setup),
    (Setup, Running),
    (Running, Outage),
    (Running, Running),
    (Outage, Idle),
];

const TRANSPORT_EDGES: &[(Category, Category)] = &[
    (Idle, Running),
    (Running, Outage),
    (Running, Running),
    (Outage, Idle),
];

const BUFFER_NODES: &[Category] = &[Idle, Empty, Full, Outage];

impl ComponentKind {
    /// Category-level adjacency.
    pub fn allows(self, from: Category, to: Category) -> bool {
        match self {
            ComponentKind::Machine => MACHINE_EDGES.contains(&(from, to)),
            ComponentKind::Transport => TRANSPORT_EDGES.contains(&(from, to)),
            ComponentKind::Buffer => {
                from != to && BUFFER_NODES.contains(&from) && BUFFER_NODES.contains(&to)
            }
        }
    }
}

/// A lifecycle tag of one component kind.
pub trait Lifecycle: Copy + PartialEq {
    const KIND: ComponentKind;

    fn category(self) -> Category;
}

impl Lifecycle for MachineStatus {
    const KIND: ComponentKind = ComponentKind::Machine;

    fn category(self) -> Category {
        match self {
            MachineStatus::Idle => Idle,
            MachineStatus::Setup => Setup,
            MachineStatus::Working => Running,
            MachineStatus::Outage => Outage,
        }
    }
}

impl Lifecycle for TransportStatus {
    const KIND: ComponentKind = ComponentKind::Transport;

    fn category(self) -> Category {
        match self {
            TransportStatus::Idle => Idle,
            TransportStatus::Working
            | TransportStatus::Pickup
            | TransportStatus::WaitingPickup
            | TransportStatus::Transit => Running,
            TransportStatus::Outage => Outage,
        }
    }
}

impl Lifecycle for BufferStatus {
    const KIND: ComponentKind = ComponentKind::Buffer;

    fn category(self) -> Category {
        match self {
            BufferStatus::Empty => Empty,
            BufferStatus::NotEmpty => Idle,
            BufferStatus::Full => Full,
        }
    }
}

/// Whether `from -> to` is a legal lifecycle step.
pub fn is_valid_transition<L: Lifecycle>(from: L, to: L) -> bool {
    from != to && L::KIND.allows(from.category(), to.category())
}
