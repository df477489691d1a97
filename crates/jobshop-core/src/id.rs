use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a `u32` id newtype with a short display prefix (`m-3`, `j-0`, ...).
macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifies a machine. Cheap to copy and compare.
    MachineId,
    "m"
);
numeric_id!(
    /// Identifies a transport vehicle (AGV).
    TransportId,
    "t"
);
numeric_id!(
    /// Identifies a buffer: free-standing, machine-owned, or transport-owned.
    BufferId,
    "b"
);
numeric_id!(
    /// Identifies a job.
    JobId,
    "j"
);
numeric_id!(
    /// Identifies an operation. Unique across the whole instance.
    OperationId,
    "o"
);
numeric_id!(
    /// Identifies a tool that a machine mounts for an operation.
    ToolId,
    "tl"
);

/// Any component that can be the subject of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentId {
    Machine(MachineId),
    Transport(TransportId),
    Buffer(BufferId),
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentId::Machine(id) => id.fmt(f),
            ComponentId::Transport(id) => id.fmt(f),
            ComponentId::Buffer(id) => id.fmt(f),
        }
    }
}

impl From<MachineId> for ComponentId {
    fn from(id: MachineId) -> Self {
        ComponentId::Machine(id)
    }
}

impl From<TransportId> for ComponentId {
    fn from(id: TransportId) -> Self {
        ComponentId::Transport(id)
    }
}

impl From<BufferId> for ComponentId {
    fn from(id: BufferId) -> Self {
        ComponentId::Buffer(id)
    }
}

/// A place a transport can travel to. Machine-owned buffers share their
/// machine's location; free-standing buffers are locations of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Location {
    Machine(MachineId),
    Buffer(BufferId),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Machine(id) => id.fmt(f),
            Location::Buffer(id) => id.fmt(f),
        }
    }
}
