//! CLI argument parsing for latency-lut

use crate::lookup_table::TableFormat;
use crate::pipeline::BuildConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "latency-lut")]
#[command(version)]
#[command(
    about = "Build a per-layer latency lookup table from on-device benchmark traces",
    long_about = None
)]
pub struct Cli {
    /// Directory with benchmarked model files and their architecture configs (.json)
    #[arg(long = "model-dir", value_name = "DIR", default_value = "./.models/")]
    pub model_dir: PathBuf,

    /// Directory with benchmark results on the target board (.json)
    #[arg(long = "result-dir", value_name = "DIR", default_value = "./.benchmark/")]
    pub result_dir: PathBuf,

    /// Architecture family of the models (e.g. mobilenetv2)
    #[arg(long = "model-class", value_name = "FAMILY")]
    pub model_class: Option<String>,

    /// Model file extension used to find benchmarked models (e.g. .tflite)
    #[arg(long = "model-type", value_name = "EXT")]
    pub model_type: Option<String>,

    /// Network input shape as HEIGHT WIDTH
    #[arg(long = "input-shape", num_args = 2, value_names = ["H", "W"])]
    pub input_shape: Option<Vec<usize>>,

    /// Directory to write the final lookup table into
    #[arg(long = "save-dir", value_name = "DIR", default_value = "./.lut/")]
    pub save_dir: PathBuf,

    /// Output format of the lookup table
    #[arg(long = "format", value_enum)]
    pub format: Option<TableFormat>,

    /// Worker threads for attribution
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Build config file (TOML); flags given on the command line take precedence
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Operator decomposition registry (TOML) replacing the family's built-in one
    #[arg(long = "ops", value_name = "FILE")]
    pub ops: Option<PathBuf>,

    /// Enable debug tracing output
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Overlay explicit flags onto a base config
    pub fn apply_to(&self, mut config: BuildConfig) -> BuildConfig {
        if let Some(family) = &self.model_class {
            config.family = family.clone();
        }
        if let Some(ext) = &self.model_type {
            config.model_ext = ext.clone();
        }
        if let Some([h, w]) = self.input_shape.as_deref() {
            config.input_shape = [*h, *w];
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        config
    }
}
