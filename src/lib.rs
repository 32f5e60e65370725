//! latency-lut - Per-layer hardware latency lookup tables for NAS
//!
//! Builds a reusable latency table for a neural-architecture search space from
//! real on-device benchmark traces: each sampled architecture is walked into an
//! ordered list of canonical layer keys, its flat operator trace is partitioned
//! into per-layer latency sums, and the sums are aggregated across models into
//! `{count, mean, std}` per key.

pub mod aggregate;
pub mod attribution;
pub mod cli;
pub mod dataset;
pub mod decomposition;
pub mod error;
pub mod family;
pub mod layer_key;
pub mod lookup_table;
pub mod pipeline;
pub mod trace;

pub use error::{LutError, Result};
