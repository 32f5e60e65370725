// Attribution engine: one greedy in-order sweep over the trace

use crate::error::{LutError, Result};
use crate::family::LayerOps;
use crate::layer_key::LayerKey;
use crate::trace::TraceEvent;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// Per-layer latency (ms, 4 decimals) for one benchmarked model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelLatencyTable {
    latencies: BTreeMap<LayerKey, f64>,
}

impl ModelLatencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a layer latency, returning the previous value for a repeated key
    pub fn insert(&mut self, key: LayerKey, latency_ms: f64) -> Option<f64> {
        self.latencies.insert(key, latency_ms)
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.latencies.get(key).copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, LayerKey, f64> {
        self.latencies.iter()
    }

    pub fn len(&self) -> usize {
        self.latencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latencies.is_empty()
    }

    /// Sum of all layer latencies
    pub fn total_ms(&self) -> f64 {
        self.latencies.values().sum()
    }
}

impl FromIterator<(LayerKey, f64)> for ModelLatencyTable {
    fn from_iter<I: IntoIterator<Item = (LayerKey, f64)>>(iter: I) -> Self {
        Self {
            latencies: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ModelLatencyTable {
    type Item = (&'a LayerKey, &'a f64);
    type IntoIter = btree_map::Iter<'a, LayerKey, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.latencies.iter()
    }
}

/// Attribution output for one model
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionReport {
    pub table: ModelLatencyTable,

    /// Events charged to some layer
    pub consumed_events: usize,

    /// Events left after the last layer
    pub trailing_events: usize,

    /// Duration of the trailing events
    pub trailing_ms: f64,
}

impl fmt::Display for AttributionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} layers, {:.4} ms attributed ({} events), {} trailing events ({:.4} ms)",
            self.table.len(),
            self.table.total_ms(),
            self.consumed_events,
            self.trailing_events,
            self.trailing_ms
        )
    }
}

/// Round to 4 decimal places
///
/// Rounds the exact stored binary value; exact ties go to even.
pub fn round_latency(ms: f64) -> f64 {
    format!("{:.4}", ms).parse().unwrap_or(ms)
}

/// Attribute a trace to layers
///
/// For each layer in order, events are popped from the front of the trace and
/// their durations accumulated until every expected operator has been seen in
/// order. The pointer into the expected sequence only ever compares against
/// its current position, so repeated names match positionally.
///
/// # Errors
/// [`LutError::TraceExhausted`] when the trace runs out before a layer's
/// expected operators are all observed.
///
/// # Example
/// ```
/// use latency_lut::attribution::attribute;
/// use latency_lut::family::LayerOps;
/// use latency_lut::layer_key::LayerKey;
/// use latency_lut::trace::TraceEvent;
///
/// let key = LayerKey::from("L");
/// let ops = vec!["A".to_string(), "B".to_string()];
/// let layers = [LayerOps { key: &key, operators: &ops }];
/// let trace = vec![
///     TraceEvent::new("A", 1.0),
///     TraceEvent::new("X", 0.5),
///     TraceEvent::new("B", 2.0),
///     TraceEvent::new("A", 3.0),
/// ];
///
/// let report = attribute(&layers, &trace).unwrap();
/// assert_eq!(report.table.get("L"), Some(3.5));
/// assert_eq!(report.trailing_events, 1);
/// ```
pub fn attribute(layers: &[LayerOps<'_>], trace: &[TraceEvent]) -> Result<AttributionReport> {
    let mut queue = trace.iter();
    let mut table = ModelLatencyTable::new();
    let mut consumed_events = 0;

    for layer in layers {
        let expected = layer.operators;
        let mut latency = 0.0;
        let mut matched = 0;
        let mut layer_events = 0;

        while matched < expected.len() {
            let event = queue.next().ok_or_else(|| LutError::TraceExhausted {
                layer: layer.key.to_string(),
                matched,
                expected: expected.len(),
                consumed: layer_events,
            })?;
            layer_events += 1;
            latency += event.duration_ms;
            if event.operator == expected[matched] {
                matched += 1;
            }
        }

        consumed_events += layer_events;
        let latency = round_latency(latency);
        tracing::debug!(
            "{}: {:.4} ms over {} events",
            layer.key,
            latency,
            layer_events
        );

        if table.insert(layer.key.clone(), latency).is_some() {
            tracing::debug!("{} repeated in model, keeping last occurrence", layer.key);
        }
    }

    let trailing: Vec<&TraceEvent> = queue.collect();
    let trailing_ms: f64 = trailing.iter().map(|e| e.duration_ms).sum();
    if !trailing.is_empty() {
        tracing::debug!(
            "{} trailing trace events ({:.4} ms) not attributed",
            trailing.len(),
            trailing_ms
        );
    }

    Ok(AttributionReport {
        table,
        consumed_events,
        trailing_events: trailing.len(),
        trailing_ms,
    })
}
