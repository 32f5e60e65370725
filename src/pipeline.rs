//! Batch lookup-table construction
//!
//! Runs key-list construction and trace attribution for every benchmarked
//! model, isolating failures per model, then aggregates the survivors.

use crate::aggregate::LatencySamples;
use crate::attribution::{attribute, AttributionReport};
use crate::error::{LutError, Result};
use crate::family::LatencyTableFamily;
use crate::lookup_table::{FinalLookupTable, TableFormat};
use crate::trace::{load_trace, TraceEvent};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for a table build
///
/// # Example
/// ```
/// use latency_lut::pipeline::BuildConfig;
///
/// let config = BuildConfig::default();
/// assert_eq!(config.family, "mobilenetv2");
/// assert_eq!(config.input_shape, [160, 160]);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Architecture family (search space) name
    pub family: String,

    /// Network input `[height, width]`
    pub input_shape: [usize; 2],

    /// Extension of benchmarked model files, e.g. ".tflite"
    pub model_ext: String,

    /// Worker threads for attribution
    pub jobs: usize,

    /// Output format of the final table
    pub format: TableFormat,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            family: "mobilenetv2".to_string(),
            input_shape: [160, 160],
            model_ext: ".tflite".to_string(),
            jobs: 1,
            format: TableFormat::Json,
        }
    }
}

impl BuildConfig {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse build config TOML")
    }

    /// Load a build config from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read build config: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.input_shape.contains(&0) {
            return Err(format!(
                "input_shape must be non-zero, got {:?}",
                self.input_shape
            ));
        }

        if self.model_ext.is_empty() || self.model_ext == ".json" {
            return Err(format!(
                "model_ext must be a non-empty extension other than .json, got '{}'",
                self.model_ext
            ));
        }

        if self.jobs == 0 {
            return Err("jobs must be >= 1".to_string());
        }

        Ok(())
    }

    pub fn input_hw(&self) -> (usize, usize) {
        (self.input_shape[0], self.input_shape[1])
    }
}

/// Files belonging to one benchmarked model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelJob {
    pub name: String,
    pub config_path: PathBuf,
    pub result_path: PathBuf,
}

/// One model with its config and trace in memory
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub name: String,
    pub config: serde_json::Value,
    pub trace: Vec<TraceEvent>,
}

impl ModelJob {
    /// Read the architecture config and benchmark trace
    pub fn load(&self) -> Result<ModelInput> {
        let content = fs::read_to_string(&self.config_path)?;
        let config = serde_json::from_str(&content)?;
        let trace = load_trace(&self.result_path)?;
        Ok(ModelInput {
            name: self.name.clone(),
            config,
            trace,
        })
    }
}

/// A model that was skipped, with the reason
#[derive(Debug)]
pub struct ModelFailure {
    pub model: String,
    pub error: LutError,
}

/// Outcome of a batch build
#[derive(Debug, Default)]
pub struct BatchReport {
    pub table: FinalLookupTable,
    /// Models that contributed samples, in input order
    pub processed: Vec<String>,
    pub failures: Vec<ModelFailure>,
}

/// Key list, decomposition and attribution for one model
pub fn process_model(
    family: &dyn LatencyTableFamily,
    input: &ModelInput,
) -> Result<AttributionReport> {
    let layers = family.build_key_list(&input.config)?;
    let resolved = family.resolve_operators(&layers)?;
    attribute(&resolved, &input.trace)
}

#[derive(Default)]
struct ChunkOutcome {
    samples: LatencySamples,
    processed: Vec<String>,
    failures: Vec<ModelFailure>,
}

fn run_chunk(family: &dyn LatencyTableFamily, jobs: &[ModelJob]) -> ChunkOutcome {
    let mut outcome = ChunkOutcome::default();

    for job in jobs {
        tracing::info!("{} is being processed", job.name);

        match job.load().and_then(|input| process_model(family, &input)) {
            Ok(report) => {
                tracing::debug!("{}: {}", job.name, report);
                outcome.samples.add_model(&report.table);
                outcome.processed.push(job.name.clone());
            }
            Err(error) => {
                tracing::warn!("Skipping {}: {}", job.name, error);
                outcome.failures.push(ModelFailure {
                    model: job.name.clone(),
                    error,
                });
            }
        }
    }

    outcome
}

/// Build the lookup table from a set of benchmarked models
///
/// A model that fails at any stage is recorded in
/// [`BatchReport::failures`] and excluded from aggregation; the rest still
/// contribute. With `workers > 1` the jobs are split into contiguous chunks
/// attributed on scoped threads, and their partial samples merged.
pub fn run_batch(
    family: &dyn LatencyTableFamily,
    jobs: &[ModelJob],
    workers: usize,
) -> anyhow::Result<BatchReport> {
    if jobs.is_empty() {
        return Ok(BatchReport::default());
    }

    let workers = workers.clamp(1, jobs.len());
    let outcomes = if workers == 1 {
        vec![run_chunk(family, jobs)]
    } else {
        let chunk_size = (jobs.len() + workers - 1) / workers;
        crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move |_| run_chunk(family, chunk)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<std::result::Result<Vec<_>, _>>()
        })
        .and_then(|joined| joined)
        .map_err(|_| anyhow::anyhow!("Attribution worker thread panicked"))?
    };

    let mut samples = LatencySamples::new();
    let mut report = BatchReport::default();
    for outcome in outcomes {
        samples.merge(outcome.samples);
        report.processed.extend(outcome.processed);
        report.failures.extend(outcome.failures);
    }
    report.table = samples.finish();

    tracing::info!(
        "Aggregated {} layer keys from {} models ({} skipped)",
        report.table.len(),
        samples.models(),
        report.failures.len()
    );

    Ok(report)
}
