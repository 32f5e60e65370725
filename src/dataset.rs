//! Benchmarked-model discovery
//!
//! Pairs each model file in the model directory with its architecture config
//! (same stem, `.json`, next to the model) and its benchmark result (same
//! `.json` name in the result directory).

use crate::pipeline::ModelJob;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Find model files ending in `model_ext` and build their jobs, sorted by name
pub fn discover_jobs(
    model_dir: &Path,
    result_dir: &Path,
    model_ext: &str,
) -> Result<Vec<ModelJob>> {
    let entries = fs::read_dir(model_dir)
        .with_context(|| format!("Failed to read model directory: {}", model_dir.display()))?;

    let mut jobs = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", model_dir.display()))?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            tracing::warn!("Skipping non UTF-8 file name in {}", model_dir.display());
            continue;
        };
        let Some(stem) = file_name.strip_suffix(model_ext) else {
            continue;
        };
        if stem.is_empty() {
            continue;
        }

        let config_name = format!("{}.json", stem);
        jobs.push(ModelJob {
            name: config_name.clone(),
            config_path: model_dir.join(&config_name),
            result_path: result_dir.join(&config_name),
        });
    }
    jobs.sort_by(|a, b| a.name.cmp(&b.name));

    let benchmarked = count_results(result_dir)?;
    tracing::info!("Found {} model configs", jobs.len());
    tracing::info!("Found {} benchmarked models", benchmarked);
    if benchmarked != jobs.len() {
        tracing::warn!(
            "Model config (.json) names must match benchmark result (.json) names; unmatched models will be skipped"
        );
    }

    Ok(jobs)
}

fn count_results(result_dir: &Path) -> Result<usize> {
    let entries = fs::read_dir(result_dir)
        .with_context(|| format!("Failed to read result directory: {}", result_dir.display()))?;

    let mut count = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", result_dir.display()))?;
        if entry.path().extension().is_some_and(|ext| ext == "json") {
            count += 1;
        }
    }
    Ok(count)
}
