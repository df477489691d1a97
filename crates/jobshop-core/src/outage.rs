//! Outage scheduling.
//!
//! An outage becomes due once `frequency` time has passed since the end of
//! its previous activation (or since time zero). The frequency is sampled
//! once per cycle and remembered, so checking repeatedly does not reroll it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::duration::{DurationSampler, SampleKind};
use crate::instance::OutageConfig;
use crate::sim::{StateHash, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutageStatus {
    Inactive {
        last_active_end: Time,
        /// Sampled frequency for the current cycle.
        due_after: Option<Time>,
    },
    Active {
        start: Time,
        end: Time,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageState {
    pub status: OutageStatus,
}

impl Default for OutageState {
    fn default() -> Self {
        Self {
            status: OutageStatus::Inactive {
                last_active_end: 0,
                due_after: None,
            },
        }
    }
}

impl OutageState {
    pub fn is_active(&self) -> bool {
        matches!(self.status, OutageStatus::Active { .. })
    }

    pub fn active_end(&self) -> Option<Time> {
        match self.status {
            OutageStatus::Active { end, .. } => Some(end),
            OutageStatus::Inactive { .. } => None,
        }
    }

    pub(crate) fn hash_into(&self, h: &mut StateHash) {
        match self.status {
            OutageStatus::Inactive {
                last_active_end,
                due_after,
            } => {
                h.write_u8(0);
                h.write_u64(last_active_end);
                h.write_opt_time(due_after);
            }
            OutageStatus::Active { start, end } => {
                h.write_u8(1);
                h.write_u64(start);
                h.write_u64(end);
            }
        }
    }
}

/// Activate every outage whose frequency condition holds at `now`.
/// Returns how many fired.
pub fn fire_due(
    configs: &[OutageConfig],
    states: &mut [OutageState],
    now: Time,
    sampler: &mut dyn DurationSampler,
) -> usize {
    let mut fired = 0;
    for (i, (config, state)) in configs.iter().zip(states.iter_mut()).enumerate() {
        let OutageStatus::Inactive {
            last_active_end,
            due_after,
        } = state.status
        else {
            continue;
        };
        let due = match due_after {
            Some(d) => d,
            None => config.frequency.sample(sampler, SampleKind::OutageFrequency),
        };
        if now.saturating_sub(last_active_end) >= due {
            let duration = config.duration.sample(sampler, SampleKind::OutageDuration);
            debug!(outage = i, kind = ?config.kind, start = now, duration, "outage fired");
            state.status = OutageStatus::Active {
                start: now,
                end: now.saturating_add(duration),
            };
            fired += 1;
        } else {
            state.status = OutageStatus::Inactive {
                last_active_end,
                due_after: Some(due),
            };
        }
    }
    fired
}

/// End of the longest active outage.
pub fn occupancy(states: &[OutageState]) -> Option<Time> {
    states.iter().filter_map(OutageState::active_end).max()
}

/// Deactivate every outage that has ended by `now`, starting a new cycle.
pub fn release(states: &mut [OutageState], now: Time) {
    for state in states.iter_mut() {
        match state.status {
            OutageStatus::Active { end, .. } if end <= now => {
                state.status = OutageStatus::Inactive {
                    last_active_end: end,
                    due_after: None,
                };
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::{Distribution, DurationSource, SeededSampler};
    use crate::instance::OutageKind;

    fn config(frequency: u64, duration: u64) -> OutageConfig {
        OutageConfig {
            kind: OutageKind::Maintenance,
            frequency: DurationSource::Fixed(frequency),
            duration: DurationSource::Fixed(duration),
        }
    }

    #[test]
    fn fires_only_after_frequency_elapsed() {
        let configs = [config(10, 5)];
        let mut states = [OutageState::default()];
        let mut sampler = SeededSampler::new(0);

        assert_eq!(fire_due(&configs, &mut states, 4, &mut sampler), 0);
        assert_eq!(
            states[0].status,
            OutageStatus::Inactive {
                last_active_end: 0,
                due_after: Some(10),
            }
        );
        assert_eq!(fire_due(&configs, &mut states, 12, &mut sampler), 1);
        assert_eq!(states[0].status, OutageStatus::Active { start: 12, end: 17 });
        assert_eq!(occupancy(&states), Some(17));
    }

    #[test]
    fn release_starts_next_cycle_from_end() {
        let configs = [config(10, 5)];
        let mut states = [OutageState::default()];
        let mut sampler = SeededSampler::new(0);
        fire_due(&configs, &mut states, 10, &mut sampler);

        release(&mut states, 14);
        assert!(states[0].is_active(), "not over yet");
        release(&mut states, 15);
        assert_eq!(
            states[0].status,
            OutageStatus::Inactive {
                last_active_end: 15,
                due_after: None,
            }
        );
        assert_eq!(fire_due(&configs, &mut states, 24, &mut sampler), 0);
        assert_eq!(fire_due(&configs, &mut states, 25, &mut sampler), 1);
    }

    #[test]
    fn endless_outage_saturates() {
        let configs = [config(0, u64::MAX)];
        let mut states = [OutageState::default()];
        let mut sampler = SeededSampler::new(0);
        assert_eq!(fire_due(&configs, &mut states, 3, &mut sampler), 1);
        assert_eq!(occupancy(&states), Some(u64::MAX));
    }

    #[test]
    fn occupancy_is_longest_active() {
        let configs = [config(0, 3), config(0, 8), config(100, 1)];
        let mut states = [OutageState::default(); 3];
        let mut sampler = SeededSampler::new(0);
        assert_eq!(fire_due(&configs, &mut states, 2, &mut sampler), 2);
        assert_eq!(occupancy(&states), Some(10));
        assert!(!states[2].is_active());
    }

    #[test]
    fn sampled_frequency_is_kept_between_checks() {
        let cfg = OutageConfig {
            kind: OutageKind::Failure,
            frequency: DurationSource::Stochastic(Distribution::Uniform { low: 50, high: 500 }),
            duration: DurationSource::Fixed(1),
        };
        let mut states = [OutageState::default()];
        let mut sampler = SeededSampler::new(9);
        fire_due(std::slice::from_ref(&cfg), &mut states, 1, &mut sampler);
        let first = states[0].status;
        let after_first = sampler.clone();
        fire_due(std::slice::from_ref(&cfg), &mut states, 2, &mut sampler);
        assert_eq!(states[0].status, first);
        assert_eq!(sampler, after_first, "no new draw while the cycle is pending");
    }

    #[test]
    fn no_outages_no_occupancy() {
        let mut sampler = SeededSampler::new(0);
        assert_eq!(fire_due(&[], &mut [], 100, &mut sampler), 0);
        assert_eq!(occupancy(&[]), None);
    }
}
