#![no_main]
use jobshop_core::snapshot::{decode_state, read_header};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must not panic -- returning Err is fine.
    let _ = read_header(data);
    let _ = decode_state(data);
});
