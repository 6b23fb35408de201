//! Aggregate statistics across every signal in a store.
//!
//! All operations concatenate the signals' buffers in store order and reduce
//! the combined buffer. The store lock is held only while the buffers are
//! copied out; reductions run unlocked.
//!
//! Note the two spreads: [`run_simulation`] reports the population standard
//! deviation (divisor `N`), while [`describe`] reports the sample standard
//! deviation (divisor `N - 1`). Both are kept as separate outputs.

use std::fmt;

use tracing::info;

use crate::reductions;
use crate::store::SignalStore;

/// Default histogram bin count.
pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

/// Combined mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationStats {
    pub mean: f64,
    pub std: f64,
}

/// Descriptive summary of the combined buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` for a single sample.
    pub std: Option<f64>,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<6} {:>14}", "", "signal_data")?;
        writeln!(f, "{:<6} {:>14.6}", "count", self.count as f64)?;
        writeln!(f, "{:<6} {:>14.6}", "mean", self.mean)?;
        match self.std {
            Some(std) => writeln!(f, "{:<6} {:>14.6}", "std", std)?,
            None => writeln!(f, "{:<6} {:>14}", "std", "NaN")?,
        }
        writeln!(f, "{:<6} {:>14.6}", "min", self.min)?;
        writeln!(f, "{:<6} {:>14.6}", "25%", self.p25)?;
        writeln!(f, "{:<6} {:>14.6}", "50%", self.p50)?;
        writeln!(f, "{:<6} {:>14.6}", "75%", self.p75)?;
        write!(f, "{:<6} {:>14.6}", "max", self.max)
    }
}

/// Equal-width histogram of the combined buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `counts.len() + 1` ascending bin edges.
    pub edges: Vec<f64>,
    /// Samples per bin. The last bin includes its upper edge.
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width buckets spanning their range.
    ///
    /// A degenerate range (all samples equal) is widened to `v ± 0.5`.
    /// Returns `None` for an empty input.
    pub fn from_values(values: &[f64], bins: usize) -> Option<Self> {
        let bins = bins.max(1);
        let mut lo = reductions::min(values)?;
        let mut hi = reductions::max(values)?;
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        // Divide before subtracting so a span wider than f64::MAX stays finite.
        let width = hi / bins as f64 - lo / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0usize; bins];
        for value in values {
            let index = ((value / width - lo / width) as usize).min(bins - 1);
            counts[index] += 1;
        }

        Some(Self { edges, counts })
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Render the histogram as text bars scaled to `width` characters.
    pub fn render_ascii(&self, width: usize) -> String {
        let max_count = self.counts.iter().copied().max().unwrap_or(0);
        let mut output = format!("Signal Data Distribution ({} samples)\n", self.total());
        if max_count == 0 {
            return output;
        }

        for (index, count) in self.counts.iter().enumerate() {
            let bar_len = (*count as f64 / max_count as f64 * width as f64).round() as usize;
            output.push_str(&format!(
                "{:>10.2} - {:<10.2} [{:>6}] {}\n",
                self.edges[index],
                self.edges[index + 1],
                count,
                "█".repeat(bar_len)
            ));
        }
        output
    }
}

/// Copy every signal's samples into one buffer, in store order.
pub fn combined(store: &SignalStore) -> Vec<f64> {
    store.with_signals(|signals| {
        signals
            .iter()
            .flat_map(|signal| signal.data().iter().copied())
            .collect()
    })
}

/// Combined mean and population standard deviation.
///
/// An empty store yields exactly `{ mean: 0.0, std: 0.0 }`.
pub fn run_simulation(store: &SignalStore) -> SimulationStats {
    let values = combined(store);
    if values.is_empty() {
        return SimulationStats::default();
    }
    SimulationStats {
        mean: reductions::mean(&values),
        std: reductions::population_std(&values),
    }
}

/// Count, mean, sample standard deviation, min, quartiles and max.
///
/// Returns `None` for an empty store.
pub fn describe(store: &SignalStore) -> Option<Summary> {
    let mut values = combined(store);
    if values.is_empty() {
        return None;
    }

    let mean = reductions::mean(&values);
    let std = reductions::sample_std(&values);
    values.sort_by(f64::total_cmp);

    Some(Summary {
        count: values.len(),
        mean,
        std,
        min: values[0],
        p25: reductions::quantile(&values, 0.25)?,
        p50: reductions::quantile(&values, 0.5)?,
        p75: reductions::quantile(&values, 0.75)?,
        max: values[values.len() - 1],
    })
}

/// Histogram of the combined buffer, or `None` when the store is empty.
pub fn histogram(store: &SignalStore, bins: usize) -> Option<Histogram> {
    let histogram = Histogram::from_values(&combined(store), bins);
    if histogram.is_none() {
        info!("No signals to visualize");
    }
    histogram
}
