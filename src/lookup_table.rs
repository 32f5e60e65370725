//! Persisted latency lookup table
//!
//! Maps each layer key to `{count, mean, std}` over every benchmarked model
//! that contained the layer. Downstream predictors estimate a candidate's
//! latency by summing `mean` over its key list.

use crate::layer_key::LayerKey;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// On-disk format of the lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Pretty-printed JSON (default)
    #[default]
    Json,
    /// TOML, one table per layer key
    Toml,
}

impl TableFormat {
    /// Canonical output file name for this format
    pub fn file_name(self) -> &'static str {
        match self {
            TableFormat::Json => "final_lookup_table.json",
            TableFormat::Toml => "final_lookup_table.toml",
        }
    }

    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => TableFormat::Toml,
            _ => TableFormat::Json,
        }
    }
}

/// Latency statistics for one layer key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerStats {
    /// Number of samples (always >= 1)
    pub count: usize,
    /// Mean latency in milliseconds
    pub mean: f64,
    /// Sample standard deviation (n - 1), 0 for a single sample
    pub std: f64,
}

impl LayerStats {
    /// Summarize latency samples
    ///
    /// Samples are sorted first so the result does not depend on the order
    /// models were processed in. Returns `None` for an empty slice.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let ss: f64 = sorted.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        } else {
            0.0
        };

        Some(Self { count, mean, std })
    }
}

/// Final per-layer lookup table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalLookupTable {
    entries: BTreeMap<LayerKey, LayerStats>,
}

impl FinalLookupTable {
    pub fn get(&self, key: &str) -> Option<&LayerStats> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, LayerKey, LayerStats> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the table in the given format
    pub fn to_string_pretty(&self, format: TableFormat) -> Result<String> {
        match format {
            TableFormat::Json => {
                serde_json::to_string_pretty(self).context("Failed to serialize table as JSON")
            }
            TableFormat::Toml => {
                toml::to_string_pretty(self).context("Failed to serialize table as TOML")
            }
        }
    }

    /// Write the table to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P, format: TableFormat) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_string_pretty(format)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write lookup table: {}", path.display()))
    }

    /// Load a table, picking the format from the file extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read lookup table: {}", path.display()))?;

        match TableFormat::from_path(path) {
            TableFormat::Json => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON table: {}", path.display())),
            TableFormat::Toml => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML table: {}", path.display())),
        }
    }
}

impl FromIterator<(LayerKey, LayerStats)> for FinalLookupTable {
    fn from_iter<I: IntoIterator<Item = (LayerKey, LayerStats)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
