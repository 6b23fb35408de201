//! Cosmic Runtime.
//!
//! Concurrent generation, aggregation and checkpointing of synthetic
//! numeric signals.
//!
//! # Architecture
//!
//! - [`types`] - [`Signal`] and its generation parameters [`SignalParams`]
//! - [`generator`] - Bounded iterative refinement ([`SignalGenerator`])
//! - [`store`] - Lock-protected shared collection ([`SignalStore`])
//! - [`reductions`] - Deterministic sums, spreads and quantiles
//! - [`aggregate`] - Combined statistics, summaries and histograms
//! - [`checkpoint`] - Atomic JSON persistence of the store
//! - [`enrichment`] - Weather-derived parameters with fixed fallbacks
//! - [`run`] - Phase-sequenced batch driver
//! - [`error`] - Contract-violation errors
//!
//! # Example
//!
//! ```no_run
//! use cosmic_runtime::enrichment::FixedParameters;
//! use cosmic_runtime::run::{RunOptions, run_batch};
//! use cosmic_runtime::SignalStore;
//!
//! let store = SignalStore::new();
//! let report = run_batch(&store, &RunOptions::default(), &FixedParameters::default())?;
//! println!("mean = {}, std = {}", report.stats.mean, report.stats.std);
//! # Ok::<(), cosmic_runtime::run::RunError>(())
//! ```

pub mod aggregate;
pub mod checkpoint;
pub mod enrichment;
pub mod error;
pub mod generator;
pub mod reductions;
pub mod run;
pub mod store;
pub mod types;

pub use aggregate::{Histogram, SimulationStats, Summary};
pub use checkpoint::{CheckpointError, RestoreOutcome};
pub use enrichment::{
    Enrichment, EnrichmentClient, EnrichmentConfig, EnrichmentError, FixedParameters,
    ParameterSource, ScaleSource,
};
pub use error::{Error, Result};
pub use generator::{Generation, SignalGenerator};
pub use run::{CheckpointOutcome, RunError, RunOptions, RunReport, run_batch};
pub use store::SignalStore;
pub use types::{Signal, SignalParams};
