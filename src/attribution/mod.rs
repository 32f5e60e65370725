// Trace-to-layer attribution
//
// Partitions one flat benchmark trace into per-layer latency sums by sweeping
// it once, left to right, against each layer's expected operator sequence.
//
// The expected operators only need to appear as a subsequence of the span a
// layer consumes; every consumed event, matched or not, is charged to the
// current layer. Runtime bookkeeping between landmarks therefore lands on the
// layer being walked when it occurs.

mod engine;

pub use engine::{attribute, round_latency, AttributionReport, ModelLatencyTable};
