#![no_main]
use arbitrary::Arbitrary;
use jobshop_core::engine::{Simulator, is_done};
use jobshop_core::sim::{JumpToEvent, Time};
use jobshop_core::snapshot::{decode_state, encode_state};
use jobshop_core::test_utils::*;
use libfuzzer_sys::fuzz_target;

/// One controller decision per tick.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Pick { index: u8 },
    PickTwo { a: u8, b: u8 },
    Wait,
    Snapshot,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    durations: Vec<[u8; 3]>,
    transports: u8,
    seed: u64,
    ops: Vec<FuzzOp>,
}

fuzz_target!(|input: FuzzInput| {
    let rows: Vec<[Time; 3]> = input
        .durations
        .iter()
        .take(6)
        .map(|d| d.map(|t| Time::from(t % 8) + 1))
        .collect();
    if rows.is_empty() {
        return;
    }
    let slices: Vec<&[Time]> = rows.iter().map(|r| r.as_slice()).collect();
    let instance = flow_shop(&slices, usize::from(input.transports % 3) + 1);
    let mut sim = Simulator::seeded(instance.clone(), input.seed);
    let mut state = sim.initial_state().unwrap();

    // Limit operations to prevent timeouts.
    for op in input.ops.iter().take(300) {
        if is_done(&state) {
            break;
        }
        let possible = sim.possible_transitions(&state).unwrap();
        let pick = |i: u8| possible.get(usize::from(i) % possible.len().max(1)).copied();
        let requested: Vec<_> = match op {
            FuzzOp::Pick { index } => pick(*index).into_iter().collect(),
            FuzzOp::PickTwo { a, b } => pick(*a).into_iter().chain(pick(*b)).collect(),
            FuzzOp::Wait => Vec::new(),
            FuzzOp::Snapshot => {
                let restored = decode_state(&encode_state(&state).unwrap()).unwrap();
                assert_eq!(restored, state);
                continue;
            }
        };
        // Offered transitions only name known components, so nothing here
        // may be fatal.
        let result = sim.step(&state, &requested, &JumpToEvent).unwrap();
        if !result.success {
            assert_eq!(result.state, state);
        }
        let errors = job_placement_errors(&instance, &result.state);
        assert!(errors.is_empty(), "{errors:?}");
        state = result.state;
    }
});
