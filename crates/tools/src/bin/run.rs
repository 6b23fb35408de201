//! Cosmic Run
//!
//! Generates a batch of signals concurrently, aggregates them and
//! checkpoints the store so the next invocation resumes where this one
//! stopped.
//!
//! Usage: `cosmic-run [--workers N] [--length N] [--checkpoint PATH] [--offline]`

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use cosmic_runtime::checkpoint::DEFAULT_CHECKPOINT_PATH;
use cosmic_runtime::enrichment::{DEFAULT_CITY, DEFAULT_ENDPOINT};
use cosmic_runtime::generator::DEFAULT_MAX_DEPTH;
use cosmic_runtime::run::{DEFAULT_SIGNAL_LENGTH, DEFAULT_WORKERS};
use cosmic_runtime::types::DEFAULT_FREQUENCY;
use cosmic_runtime::{
    CheckpointOutcome, EnrichmentClient, EnrichmentConfig, FixedParameters, ParameterSource,
    RestoreOutcome, RunOptions, ScaleSource, SignalStore, run_batch,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScaleArg {
    Temperature,
    Humidity,
}

impl From<ScaleArg> for ScaleSource {
    fn from(arg: ScaleArg) -> Self {
        match arg {
            ScaleArg::Temperature => ScaleSource::Temperature,
            ScaleArg::Humidity => ScaleSource::Humidity,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "cosmic-run")]
#[command(about = "Generate, aggregate and checkpoint a batch of cosmic signals")]
struct Args {
    /// Number of concurrent generation workers
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Samples per generated signal
    #[arg(long, default_value_t = DEFAULT_SIGNAL_LENGTH)]
    length: usize,

    /// Modulus of the periodic correction pattern
    #[arg(long, default_value_t = DEFAULT_FREQUENCY)]
    frequency: usize,

    /// Base seed for reproducible runs (worker i uses seed + i)
    #[arg(long)]
    seed: Option<u64>,

    /// Refinement depth cap
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: u32,

    /// Checkpoint file to resume from and save to
    #[arg(long, default_value = DEFAULT_CHECKPOINT_PATH)]
    checkpoint: PathBuf,

    /// Disable checkpoint load and save
    #[arg(long)]
    no_checkpoint: bool,

    /// Skip the weather request and use the fallback parameters
    #[arg(long)]
    offline: bool,

    /// OpenWeatherMap API key
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// City to query
    #[arg(long, default_value = DEFAULT_CITY)]
    city: String,

    /// Weather endpoint URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Enrichment request timeout in seconds
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Reading that drives the scale factor
    #[arg(long, value_enum, default_value_t = ScaleArg::Temperature)]
    scale_source: ScaleArg,

    /// Histogram bin count
    #[arg(long, default_value_t = 20)]
    bins: usize,
}

fn main() {
    cosmic_tools::init_logging();

    let args = Args::parse();

    let source: Box<dyn ParameterSource> = if args.offline {
        info!("Offline mode, using fallback parameters");
        Box::new(FixedParameters::default())
    } else {
        if args.api_key.is_none() {
            warn!("No API key configured, enrichment will use fallback parameters");
        }
        Box::new(EnrichmentClient::new(EnrichmentConfig {
            endpoint: args.endpoint.clone(),
            city: args.city.clone(),
            api_key: args.api_key.clone(),
            timeout: Duration::from_secs(args.timeout_secs),
            scale_source: args.scale_source.into(),
            use_system_proxy: true,
        }))
    };

    let options = RunOptions {
        workers: args.workers,
        signal_length: args.length,
        frequency: args.frequency,
        seed: args.seed,
        max_depth: args.max_depth,
        checkpoint_path: (!args.no_checkpoint).then(|| args.checkpoint.clone()),
        histogram_bins: args.bins,
    };

    info!(
        "Running {} workers ({} samples each)...",
        options.workers, options.signal_length
    );

    let store = SignalStore::new();
    let report = match run_batch(&store, &options, source.as_ref()) {
        Ok(report) => report,
        Err(e) => {
            error!("Run failed: {}", e);
            process::exit(1);
        }
    };

    match &report.restore {
        Some(RestoreOutcome::Restored(count)) => info!("  Resumed {} signals", count),
        Some(RestoreOutcome::Degraded(reason)) => warn!("  Checkpoint ignored: {}", reason),
        Some(RestoreOutcome::Fresh) | None => {}
    }

    info!(
        "  Scale: {:.3}, Depth: {}",
        report.enrichment.scale, report.enrichment.depth
    );
    info!(
        "  Generated: {}, Failed: {}, Stored: {}",
        report.generated,
        report.failures.len(),
        store.len()
    );
    for failure in &report.failures {
        warn!("  Worker {} failed: {}", failure.worker, failure.reason);
    }

    for (index, signal) in store.snapshot().iter().enumerate() {
        let (mean, std) = signal.analyze();
        info!("  Signal {:03}: Mean: {:.2}, Std: {:.2}", index, mean, std);
    }

    info!(
        "Simulation results: mean = {:.4}, std = {:.4}",
        report.stats.mean, report.stats.std
    );

    if let Some(summary) = &report.summary {
        info!("Summary:\n{}", summary);
    }

    if let Some(histogram) = &report.histogram {
        info!("\n{}", histogram.render_ascii(40));
    }

    match &report.checkpoint {
        CheckpointOutcome::Saved { path, signals } => {
            info!("State saved to {} ({} signals)", path.display(), signals)
        }
        CheckpointOutcome::Failed { path, error } => {
            error!("Save to {} failed: {}", path.display(), error)
        }
        CheckpointOutcome::Disabled => {}
    }

    info!("Simulation complete!");
}
