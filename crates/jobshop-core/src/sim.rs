//! Simulation time and clock-advance strategies.
//!
//! A tick applies the requested transitions, asks a [`TimeStrategy`] where
//! the clock should go, and then resolves everything that became due. The
//! strategy only chooses the new time; it never mutates state.

use crate::instance::InstanceConfig;
use crate::state::State;
use crate::transition::ComponentTransition;

/// Simulation time, in abstract integral units.
pub type Time = u64;

// ---------------------------------------------------------------------------
// Time strategy
// ---------------------------------------------------------------------------

/// Everything a strategy may look at when choosing the next clock value.
/// Built by the orchestrator after the requested transitions were applied.
#[derive(Debug, Clone, Copy)]
pub struct TimeContext<'a> {
    pub instance: &'a InstanceConfig,
    pub state: &'a State,
    /// Transitions a controller could request right now.
    pub possible: &'a [ComponentTransition],
    /// `Some(now)` when a timed transition is due immediately, otherwise the
    /// earliest future `occupied_until`. `None` if nothing is pending.
    pub next_event: Option<Time>,
}

impl TimeContext<'_> {
    pub fn now(&self) -> Time {
        self.state.time
    }
}

/// Chooses the clock value for the rest of a tick.
///
/// Returning a value earlier than the current time is an invariant
/// violation; the orchestrator checks it.
pub trait TimeStrategy {
    fn next_time(&self, ctx: &TimeContext<'_>) -> Time;
}

/// Stay while a controller has a choice, otherwise jump to the next event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JumpToEvent;

impl TimeStrategy for JumpToEvent {
    fn next_time(&self, ctx: &TimeContext<'_>) -> Time {
        if !ctx.possible.is_empty() {
            return ctx.now();
        }
        ctx.next_event.map_or(ctx.now(), |t| t.max(ctx.now()))
    }
}

/// Advance by a constant amount every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedIncrement(pub Time);

impl TimeStrategy for FixedIncrement {
    fn next_time(&self, ctx: &TimeContext<'_>) -> Time {
        ctx.now().saturating_add(self.0)
    }
}

impl<F> TimeStrategy for F
where
    F: Fn(&TimeContext<'_>) -> Time,
{
    fn next_time(&self, ctx: &TimeContext<'_>) -> Time {
        self(ctx)
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write(&[v]);
    }

    /// `None` and `Some(t)` hash differently even when `t` is zero.
    pub fn write_opt_time(&mut self, v: Option<Time>) {
        match v {
            None => self.write_u8(0),
            Some(t) => {
                self.write_u8(1);
                self.write_u64(t);
            }
        }
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
