//! Durations that may be fixed or drawn from a distribution.
//!
//! Processing, setup, travel, and outage timings are all [`DurationSource`]s.
//! Stochastic sources are resolved through a [`DurationSampler`], which the
//! orchestrator checkpoints so a rejected tick leaves no trace in the
//! random stream.

use serde::{Deserialize, Serialize};

use crate::rng::SimRng;
use crate::sim::Time;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribution {
    /// Uniform over `low..=high`.
    Uniform { low: Time, high: Time },
    /// One of the listed values, equally likely.
    Choice(Vec<Time>),
}

impl Distribution {
    /// Expected value, rounded down. Empty choices count as zero.
    pub fn mean(&self) -> Time {
        match self {
            Distribution::Uniform { low, high } => low.midpoint(*high),
            Distribution::Choice(values) if values.is_empty() => 0,
            Distribution::Choice(values) => {
                let sum: u128 = values.iter().map(|v| u128::from(*v)).sum();
                (sum / values.len() as u128) as Time
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Distribution::Choice(values) if values.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationSource {
    Fixed(Time),
    Stochastic(Distribution),
}

impl DurationSource {
    pub fn sample(&self, sampler: &mut dyn DurationSampler, kind: SampleKind) -> Time {
        match self {
            DurationSource::Fixed(t) => *t,
            DurationSource::Stochastic(d) => sampler.sample(d, kind),
        }
    }

    /// The fixed value, or the distribution mean.
    pub fn nominal(&self) -> Time {
        match self {
            DurationSource::Fixed(t) => *t,
            DurationSource::Stochastic(d) => d.mean(),
        }
    }
}

impl From<Time> for DurationSource {
    fn from(t: Time) -> Self {
        DurationSource::Fixed(t)
    }
}

/// What a sampled duration is used for. Samplers may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Processing,
    Setup,
    Travel,
    OutageFrequency,
    OutageDuration,
}

// ---------------------------------------------------------------------------
// Samplers
// ---------------------------------------------------------------------------

/// Draws a concrete duration from a distribution.
pub trait DurationSampler {
    fn sample(&mut self, distribution: &Distribution, kind: SampleKind) -> Time;
}

/// Default sampler: a seeded SplitMix64 stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededSampler {
    rng: SimRng,
}

impl SeededSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SimRng::new(seed),
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng.reseed(seed);
    }

    pub fn rng(&self) -> &SimRng {
        &self.rng
    }
}

impl Default for SeededSampler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DurationSampler for SeededSampler {
    fn sample(&mut self, distribution: &Distribution, _kind: SampleKind) -> Time {
        match distribution {
            Distribution::Uniform { low, high } => self.rng.range_inclusive(*low, *high),
            Distribution::Choice(values) if values.is_empty() => 0,
            Distribution::Choice(values) => {
                let i = self.rng.below(values.len() as u64) as usize;
                values[i]
            }
        }
    }
}

/// Always returns the distribution mean. Useful for deterministic planning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NominalSampler;

impl DurationSampler for NominalSampler {
    fn sample(&mut self, distribution: &Distribution, _kind: SampleKind) -> Time {
        distribution.mean()
    }
}
