#![no_main]

use latency_lut::layer_key::LayerKey;
use latency_lut::trace::parse_benchmark_result;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Neither parser may panic on arbitrary input
        let _ = parse_benchmark_result(input);
        let _ = LayerKey::from(input).decode();
    }
});
