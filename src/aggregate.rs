//! Cross-model aggregation
//!
//! Collects per-layer latency samples from many attributed models and reduces
//! them to `{count, mean, std}`. Sample collection is commutative and
//! associative, so workers can each build a partial [`LatencySamples`] and
//! [`LatencySamples::merge`] them at the end.

use crate::attribution::ModelLatencyTable;
use crate::layer_key::LayerKey;
use crate::lookup_table::{FinalLookupTable, LayerStats};
use std::collections::BTreeMap;

/// Latency samples per layer key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencySamples {
    samples: BTreeMap<LayerKey, Vec<f64>>,
    models: usize,
}

impl LatencySamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample per layer of a model
    pub fn add_model(&mut self, table: &ModelLatencyTable) {
        for (key, latency) in table {
            self.samples.entry(key.clone()).or_default().push(*latency);
        }
        self.models += 1;
    }

    /// Fold another partial collection into this one
    pub fn merge(&mut self, other: LatencySamples) {
        for (key, mut latencies) in other.samples {
            self.samples.entry(key).or_default().append(&mut latencies);
        }
        self.models += other.models;
    }

    /// Number of models folded in
    pub fn models(&self) -> usize {
        self.models
    }

    /// Reduce to the final table
    pub fn finish(&self) -> FinalLookupTable {
        self.samples
            .iter()
            .filter_map(|(key, latencies)| {
                LayerStats::from_samples(latencies).map(|stats| (key.clone(), stats))
            })
            .collect()
    }
}

/// Aggregate model tables into the final lookup table
///
/// A key missing from some models simply contributes fewer samples. No input
/// yields an empty table.
///
/// # Example
/// ```
/// use latency_lut::aggregate::aggregate;
/// use latency_lut::attribution::ModelLatencyTable;
/// use latency_lut::layer_key::LayerKey;
///
/// let a: ModelLatencyTable = [(LayerKey::from("L"), 3.5)].into_iter().collect();
/// let b: ModelLatencyTable = [(LayerKey::from("L"), 4.5)].into_iter().collect();
///
/// let table = aggregate([&a, &b]);
/// let stats = table.get("L").unwrap();
/// assert_eq!(stats.count, 2);
/// assert_eq!(stats.mean, 4.0);
/// assert!((stats.std - 0.7071).abs() < 1e-4);
/// ```
pub fn aggregate<'a, I>(tables: I) -> FinalLookupTable
where
    I: IntoIterator<Item = &'a ModelLatencyTable>,
{
    let mut samples = LatencySamples::new();
    for table in tables {
        samples.add_model(table);
    }
    samples.finish()
}
