//! colloc - collocate one dataset onto the sampling of another
//!
//! Reads a JSON job holding a source and a sample dataset, runs the
//! collocation and writes the resulting dataset and run summary as JSON.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info};

use colloc::{init_tracing, log_error, log_operation_end, log_operation_start};
use colloc::{CollocationOptions, CollocationSummary, Collocator, CommonData, Config, Dataset};

/// Input of a run
#[derive(Debug, Deserialize)]
struct Job {
    source: Dataset,
    sample: Dataset,
    /// Overrides the options of the configuration
    #[serde(default)]
    options: Option<CollocationOptions>,
}

/// Output of a run
#[derive(Debug, Serialize)]
struct JobOutput {
    data: Dataset,
    num_points: Dataset,
    summary: CollocationSummary,
}

fn main() -> anyhow::Result<()> {
    let (config, paths) = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.log_level);
    info!("Starting colloc v{}", env!("CARGO_PKG_VERSION"));

    let start = Instant::now();
    log_operation_start("read_job", paths.job.to_str());
    let content = std::fs::read_to_string(&paths.job)
        .with_context(|| format!("Failed to read job file {}", paths.job.display()))?;
    let job: Job = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse job file {}", paths.job.display()))?;
    log_operation_end("read_job", start, true);

    let options = job.options.unwrap_or_else(|| config.collocation.clone());
    info!(
        source = job.source.var_name(),
        sample = job.sample.var_name(),
        kernel = %options.kernel,
        "Collocating"
    );

    let collocated = Collocator::new(options)
        .with_workers(config.runtime.workers)
        .with_probe_points(config.runtime.probe_points)
        .collocate(job.source.view(), job.sample.view())
        .map_err(|e| {
            log_error(&e, "collocate");
            e
        })?;

    if let Some(max_fraction) = config.runtime.max_invalid_fraction {
        collocated.check_tolerance(max_fraction).map_err(|e| {
            error!("{}", e);
            e
        })?;
    }

    let output = JobOutput {
        num_points: collocated.count_dataset()?,
        data: collocated.data,
        summary: collocated.summary,
    };
    let json = serde_json::to_string_pretty(&output)?;
    match &paths.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write output {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
