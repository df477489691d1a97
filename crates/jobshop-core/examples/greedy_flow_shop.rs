//! Greedy dispatch on a small job shop.
//!
//! Builds a three-machine shop with one AGV and one teleporter, then
//! always accepts the first possible transition until every job is done,
//! printing each tick.
//!
//! Run with: `RUST_LOG=debug cargo run -p jobshop-core --example greedy_flow_shop`

use jobshop_core::duration::{Distribution, DurationSource};
use jobshop_core::engine::{Simulator, is_done};
use jobshop_core::id::*;
use jobshop_core::instance::*;
use jobshop_core::sim::JumpToEvent;

fn build_shop() -> Result<InstanceConfig, InstanceError> {
    let mut b = InstanceBuilder::new();
    let input = b.add_buffer(BufferSpec::new(BufferType::Fifo, 8), Some(BufferRole::Input));
    let output = b.add_buffer(BufferSpec::UNBOUNDED_FIFO, Some(BufferRole::Output));

    // Cutting, milling (with a tool change), and inspection.
    let cut = b.add_machine(MachineSpec::default().postbuffer(BufferType::Fifo, 2));
    let mill = b.add_machine(MachineSpec::default().prebuffer(BufferType::Flex, 4));
    let inspect = b.add_machine(MachineSpec::default());
    b.add_setup_time(mill, ToolId(0), ToolId(1), 2)?;
    b.add_setup_time(mill, ToolId(1), ToolId(0), 2)?;
    b.add_outage(
        mill.into(),
        OutageConfig {
            kind: OutageKind::Failure,
            frequency: DurationSource::Fixed(15),
            duration: DurationSource::Stochastic(Distribution::Uniform { low: 1, high: 4 }),
        },
    )?;

    b.add_transport(TransportType::Agv, Location::Buffer(input));
    b.add_transport(TransportType::Teleporter, Location::Buffer(output));

    for j in 0..6u32 {
        let tool = ToolId(j % 2);
        let milling = DurationSource::Stochastic(Distribution::Choice(vec![2, 3, 5]));
        b.add_job(
            vec![
                OperationSpec::new(cut, 1 + u64::from(j % 3)),
                OperationSpec::new(mill, milling).with_tool(tool),
                OperationSpec::new(inspect, 1),
            ],
            j % 3,
        );
    }

    let stations = [
        Location::Buffer(input),
        Location::Machine(cut),
        Location::Machine(mill),
        Location::Machine(inspect),
        Location::Buffer(output),
    ];
    for (i, from) in stations.iter().enumerate() {
        for (k, to) in stations.iter().enumerate() {
            if i != k {
                b.set_travel_time(*from, *to, i.abs_diff(k) as u64);
            }
        }
    }
    b.build()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let instance = build_shop().expect("shop is valid");
    println!("lower bound on makespan: {}", instance.nominal_lower_bound());

    let mut sim = Simulator::seeded(instance, 42);
    let mut state = sim.initial_state().expect("initial state");

    for tick in 0.. {
        if is_done(&state) {
            break;
        }
        let possible = sim.possible_transitions(&state).expect("consistent state");
        let requested: Vec<_> = possible.first().copied().into_iter().collect();
        let result = sim.step(&state, &requested, &JumpToEvent).expect("consistent state");

        let chosen = requested
            .first()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!(
            "tick {tick:>3}  t={:>3}  chose {chosen:<24}  timed {:>2}  {}",
            result.state.time,
            result.timed.len(),
            result.message,
        );
        if result.stalled {
            println!("stalled");
            return;
        }
        state = result.state;
    }

    println!("makespan: {}", state.makespan().unwrap_or(0));
    for job in &state.jobs {
        let spans: Vec<String> = job
            .operations
            .iter()
            .map(|op| format!("{}@{}..{}", op.machine, op.start_time.unwrap_or(0), op.end_time.unwrap_or(0)))
            .collect();
        println!("  {}: {}", job.id, spans.join("  "));
    }
}
