//! Batch run orchestration.
//!
//! [`run_batch`] drives one complete batch through strictly sequenced phases:
//!
//! 1. **Enrich** - resolve scale and depth from the [`ParameterSource`]
//! 2. **Restore** - load the previous checkpoint into the store, if any
//! 3. **Generate** - fan out worker threads, each adding one signal
//! 4. **Join** - wait for every worker; nothing below runs before this
//! 5. **Aggregate** - statistics, summary and histogram over the store
//! 6. **Persist** - checkpoint the store
//!
//! Degraded inputs (enrichment fallback, unreadable checkpoint) and a failed
//! save are recorded in the [`RunReport`], never raised. A failing worker is
//! isolated from its siblings and reported in [`RunReport::failures`].

use std::any::Any;
use std::path::PathBuf;
use std::thread;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info};

use crate::aggregate::{self, DEFAULT_HISTOGRAM_BINS, Histogram, SimulationStats, Summary};
use crate::checkpoint::{self, DEFAULT_CHECKPOINT_PATH, RestoreOutcome};
use crate::enrichment::{Enrichment, ParameterSource};
use crate::error::{Error, Result};
use crate::generator::{DEFAULT_MAX_DEPTH, SignalGenerator};
use crate::store::SignalStore;
use crate::types::{DEFAULT_FREQUENCY, Signal, SignalParams};

/// Default number of concurrent generation workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default samples per generated signal.
pub const DEFAULT_SIGNAL_LENGTH: usize = 20;

/// Options for configuring a batch run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of worker threads, each generating one signal.
    pub workers: usize,
    /// Samples per generated signal.
    pub signal_length: usize,
    /// Modulus of the periodic correction pattern.
    pub frequency: usize,
    /// Base seed; worker `i` uses `seed + i`. Fresh entropy when `None`.
    pub seed: Option<u64>,
    /// Refinement depth cap.
    pub max_depth: u32,
    /// Checkpoint file to restore from and save to. `None` disables both.
    pub checkpoint_path: Option<PathBuf>,
    /// Histogram bin count.
    pub histogram_bins: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            signal_length: DEFAULT_SIGNAL_LENGTH,
            frequency: DEFAULT_FREQUENCY,
            seed: None,
            max_depth: DEFAULT_MAX_DEPTH,
            checkpoint_path: Some(PathBuf::from(DEFAULT_CHECKPOINT_PATH)),
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
        }
    }
}

/// A worker that did not contribute a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerFailure {
    pub worker: usize,
    pub reason: String,
}

/// Outcome of a fan-out of generation workers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub generated: usize,
    pub failures: Vec<WorkerFailure>,
}

/// What happened to the end-of-run checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointOutcome {
    Disabled,
    Saved { path: PathBuf, signals: usize },
    Failed { path: PathBuf, error: String },
}

/// Summary report returned after a batch run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Parameters the workers generated with.
    pub enrichment: Enrichment,
    /// `None` when checkpointing is disabled.
    pub restore: Option<RestoreOutcome>,
    pub generated: usize,
    pub failures: Vec<WorkerFailure>,
    pub stats: SimulationStats,
    pub summary: Option<Summary>,
    pub histogram: Option<Histogram>,
    pub checkpoint: CheckpointOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("invalid signal parameters: {0}")]
    InvalidParameters(#[from] Error),
}

/// Run one batch against `store`.
///
/// Fails only when the options themselves are invalid, before any worker is
/// spawned.
pub fn run_batch(
    store: &SignalStore,
    options: &RunOptions,
    source: &dyn ParameterSource,
) -> std::result::Result<RunReport, RunError> {
    if options.workers == 0 {
        return Err(RunError::NoWorkers);
    }

    let enrichment = source.resolve();
    info!(
        scale = enrichment.scale,
        depth = enrichment.depth,
        "Generation parameters resolved"
    );

    let params = SignalParams::new(
        options.signal_length,
        options.frequency,
        enrichment.scale,
        enrichment.depth,
    );
    params.validate()?;

    let restore = options
        .checkpoint_path
        .as_deref()
        .map(|path| checkpoint::restore(store, path));

    let generator = SignalGenerator::new(options.max_depth);
    let seed = options.seed;
    let batch = generate_concurrently(store, options.workers, |worker| {
        let mut rng = worker_rng(seed, worker);
        let signal = generator.signal(params, &mut rng)?;
        let (mean, std) = signal.analyze();
        debug!(worker, mean, std, "Signal analyzed");
        Ok(signal)
    });
    info!(
        generated = batch.generated,
        failed = batch.failures.len(),
        total = store.len(),
        "Concurrent signals added"
    );

    let stats = aggregate::run_simulation(store);
    let summary = aggregate::describe(store);
    let histogram = aggregate::histogram(store, options.histogram_bins);
    info!(mean = stats.mean, std = stats.std, "Simulation results");

    let checkpoint = match &options.checkpoint_path {
        None => CheckpointOutcome::Disabled,
        Some(path) => match checkpoint::save(store, path) {
            Ok(signals) => CheckpointOutcome::Saved {
                path: path.clone(),
                signals,
            },
            Err(err) => {
                error!(path = %path.display(), error = %err, "Checkpoint save failed");
                CheckpointOutcome::Failed {
                    path: path.clone(),
                    error: err.to_string(),
                }
            }
        },
    };

    Ok(RunReport {
        enrichment,
        restore,
        generated: batch.generated,
        failures: batch.failures,
        stats,
        summary,
        histogram,
        checkpoint,
    })
}

/// Spawn `workers` threads running `task` and add each produced signal.
///
/// Returns only after every worker has finished. An error or panic in one
/// worker is captured in its [`WorkerFailure`] and does not affect others.
pub fn generate_concurrently<F>(store: &SignalStore, workers: usize, task: F) -> BatchOutcome
where
    F: Fn(usize) -> Result<Signal> + Sync,
{
    let task = &task;
    let mut outcome = BatchOutcome::default();

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let spawned = thread::Builder::new()
                .name(format!("signal-worker-{worker}"))
                .spawn_scoped(scope, move || {
                    let signal = task(worker)?;
                    store.add(signal);
                    Ok::<(), Error>(())
                });
            match spawned {
                Ok(handle) => handles.push((worker, handle)),
                Err(err) => outcome.failures.push(WorkerFailure {
                    worker,
                    reason: format!("failed to spawn: {err}"),
                }),
            }
        }

        for (worker, handle) in handles {
            let reason = match handle.join() {
                Ok(Ok(())) => {
                    outcome.generated += 1;
                    continue;
                }
                Ok(Err(err)) => err.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            error!(worker, reason = %reason, "Generation worker failed");
            outcome.failures.push(WorkerFailure { worker, reason });
        }
    });

    outcome
}

/// Independent random source for one worker.
fn worker_rng(seed: Option<u64>, worker: usize) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(worker as u64)),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::FixedParameters;
    use tempfile::tempdir;

    fn options(dir: &std::path::Path) -> RunOptions {
        RunOptions {
            seed: Some(11),
            checkpoint_path: Some(dir.join("state.json")),
            ..RunOptions::default()
        }
    }

    #[test]
    fn test_run_batch_generates_and_saves() {
        let dir = tempdir().unwrap();
        let store = SignalStore::new();
        let report =
            run_batch(&store, &options(dir.path()), &FixedParameters::new(1.0, 3)).unwrap();

        assert_eq!(report.generated, DEFAULT_WORKERS);
        assert!(report.failures.is_empty());
        assert_eq!(report.restore, Some(RestoreOutcome::Fresh));
        assert_eq!(store.len(), DEFAULT_WORKERS);
        assert_eq!(
            report.summary.unwrap().count,
            DEFAULT_WORKERS * DEFAULT_SIGNAL_LENGTH
        );
        assert_eq!(
            report.histogram.unwrap().total(),
            DEFAULT_WORKERS * DEFAULT_SIGNAL_LENGTH
        );
        assert!(matches!(
            report.checkpoint,
            CheckpointOutcome::Saved { signals: 4, .. }
        ));
    }

    #[test]
    fn test_second_run_resumes_from_checkpoint() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path());
        run_batch(&SignalStore::new(), &opts, &FixedParameters::default()).unwrap();

        let store = SignalStore::new();
        let report = run_batch(&store, &opts, &FixedParameters::default()).unwrap();
        assert_eq!(report.restore, Some(RestoreOutcome::Restored(4)));
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let opts = RunOptions {
            workers: 0,
            checkpoint_path: None,
            ..RunOptions::default()
        };
        let err = run_batch(&SignalStore::new(), &opts, &FixedParameters::default()).unwrap_err();
        assert!(matches!(err, RunError::NoWorkers));
    }

    #[test]
    fn test_invalid_parameters_rejected_before_spawn() {
        let opts = RunOptions {
            frequency: 0,
            checkpoint_path: None,
            ..RunOptions::default()
        };
        let store = SignalStore::new();
        let err = run_batch(&store, &opts, &FixedParameters::default()).unwrap_err();
        assert!(matches!(err, RunError::InvalidParameters(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_failing_worker_is_isolated() {
        let store = SignalStore::new();
        let outcome = generate_concurrently(&store, 6, |worker| match worker {
            2 => Err(Error::invalid("length", "rejected by test")),
            4 => panic!("worker four exploded"),
            _ => Signal::from_parts(SignalParams::new(1, 1, 1.0, 0), vec![worker as f64]),
        });

        assert_eq!(outcome.generated, 4);
        assert_eq!(store.len(), 4);
        let failed: Vec<usize> = outcome.failures.iter().map(|f| f.worker).collect();
        assert_eq!(failed, vec![2, 4]);
        assert!(outcome.failures[1].reason.contains("worker four exploded"));
    }

    #[test]
    fn test_seeded_workers_differ() {
        let store = SignalStore::new();
        generate_concurrently(&store, 2, |worker| {
            let params = SignalParams::new(50, 5, 1.0, 0);
            SignalGenerator::default().signal(params, &mut worker_rng(Some(5), worker))
        });
        let signals = store.snapshot();
        assert_ne!(signals[0].data(), signals[1].data());
    }

    #[test]
    fn test_failed_save_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        let blocked = dir.path().join("occupied");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("file"), "x").unwrap();

        let opts = RunOptions {
            checkpoint_path: Some(blocked.clone()),
            seed: Some(1),
            ..RunOptions::default()
        };
        let store = SignalStore::new();
        let report = run_batch(&store, &opts, &FixedParameters::default()).unwrap();

        assert!(matches!(report.restore, Some(RestoreOutcome::Degraded(_))));
        assert!(matches!(report.checkpoint, CheckpointOutcome::Failed { .. }));
        assert_eq!(store.len(), DEFAULT_WORKERS);
    }
}
