use anyhow::{Context, Result};
use clap::Parser;
use latency_lut::cli::Cli;
use latency_lut::decomposition::OperatorRegistry;
use latency_lut::pipeline::{run_batch, BuildConfig};
use latency_lut::{dataset, family};
use std::fs;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; progress at info, everything with --debug
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let base = match &args.config {
        Some(path) => BuildConfig::from_toml(path)?,
        None => BuildConfig::default(),
    };
    let config = args.apply_to(base);
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid build configuration: {}", e);
    }

    let registry = match &args.ops {
        Some(path) => Some(OperatorRegistry::from_toml(path, &config.family)?),
        None => None,
    };
    let family = family::family_for(&config.family, config.input_hw(), registry)?;

    let jobs = dataset::discover_jobs(&args.model_dir, &args.result_dir, &config.model_ext)?;
    let report = run_batch(family.as_ref(), &jobs, config.jobs)?;

    for failure in &report.failures {
        eprintln!("skipped {}: {}", failure.model, failure.error);
    }

    fs::create_dir_all(&args.save_dir)
        .with_context(|| format!("Failed to create save directory: {}", args.save_dir.display()))?;
    let out_path = args.save_dir.join(config.format.file_name());
    report.table.save(&out_path, config.format)?;

    eprintln!(
        "Wrote {} layer keys from {}/{} models to {}",
        report.table.len(),
        report.processed.len(),
        jobs.len(),
        out_path.display()
    );

    Ok(())
}
