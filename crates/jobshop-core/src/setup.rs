use crate::duration::{DurationSampler, SampleKind};
use crate::id::ToolId;
use crate::instance::MachineConfig;
use crate::sim::Time;

/// Time to switch `machine` from `mounted` to `required`. Keeping the tool is
/// free, and so is any pair the machine's table does not list.
pub fn setup_duration(
    machine: &MachineConfig,
    mounted: ToolId,
    required: ToolId,
    sampler: &mut dyn DurationSampler,
) -> Time {
    if mounted == required {
        return 0;
    }
    machine
        .setup_time(mounted, required)
        .map_or(0, |d| d.sample(sampler, SampleKind::Setup))
}
