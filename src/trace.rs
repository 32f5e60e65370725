//! Benchmark traces
//!
//! A benchmark run on the target board yields a flat, time-ordered list of
//! per-node executions. Only the operator name and duration are used.

use crate::error::{LutError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One observed operator execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Runtime operator name (e.g. "Conv2D", "Eltwise")
    pub operator: String,
    pub duration_ms: f64,
}

impl TraceEvent {
    pub fn new(operator: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            operator: operator.into(),
            duration_ms,
        }
    }
}

/// Benchmark result document returned by the benchmark service
#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkResult {
    pub benchmark: BenchmarkBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkBody {
    pub info: BenchmarkInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkInfo {
    #[serde(default)]
    pub graphs: Vec<BenchmarkGraph>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkGraph {
    #[serde(default)]
    pub nodes: Vec<BenchmarkNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkNode {
    pub description: String,
    pub exec_time: ExecTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecTime {
    pub duration_ms: f64,
}

impl BenchmarkResult {
    /// Trace of the first graph, in execution order
    pub fn into_trace(self) -> Result<Vec<TraceEvent>> {
        let graph = self
            .benchmark
            .info
            .graphs
            .into_iter()
            .next()
            .ok_or_else(|| LutError::MalformedTrace("benchmark result has no graphs".into()))?;

        Ok(graph
            .nodes
            .into_iter()
            .map(|node| TraceEvent {
                operator: node.description,
                duration_ms: node.exec_time.duration_ms,
            })
            .collect())
    }
}

/// Parse a benchmark result document into a trace
pub fn parse_benchmark_result(content: &str) -> Result<Vec<TraceEvent>> {
    let result: BenchmarkResult = serde_json::from_str(content)
        .map_err(|e| LutError::MalformedTrace(e.to_string()))?;
    result.into_trace()
}

/// Read and parse a benchmark result file
pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceEvent>> {
    let content = fs::read_to_string(path)?;
    parse_benchmark_result(&content)
}
