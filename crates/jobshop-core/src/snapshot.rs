//! Binary snapshots of the dynamic state.
//!
//! Snapshots are `bitcode`-encoded with a versioned header so stale or
//! foreign data is rejected before anyone trusts its contents.

use serde::{Deserialize, Serialize};

use crate::sim::Time;
use crate::state::State;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a job-shop state snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x10B5_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("data too short for snapshot header")]
    TooShort,
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Simulated time of the captured state.
    pub time: Time,
    /// `State::state_hash` at capture time.
    pub state_hash: u64,
}

impl SnapshotHeader {
    pub fn new(state: &State) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            time: state.time,
            state_hash: state.state_hash(),
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateSnapshot {
    header: SnapshotHeader,
    state: State,
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

pub fn encode_state(state: &State) -> Result<Vec<u8>, SerializeError> {
    let snapshot = StateSnapshot {
        header: SnapshotHeader::new(state),
        state: state.clone(),
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode just enough to inspect the header.
pub fn read_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    if data.is_empty() {
        return Err(DeserializeError::TooShort);
    }
    // bitcode has no partial decoding.
    let snapshot: StateSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(snapshot.header)
}

pub fn decode_state(data: &[u8]) -> Result<State, DeserializeError> {
    if data.is_empty() {
        return Err(DeserializeError::TooShort);
    }
    let snapshot: StateSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    Ok(snapshot.state)
}
