//! Signal generation by bounded iterative refinement.
//!
//! A signal starts as a base buffer of uniform integers in
//! [`BASE_MIN`]`..=`[`BASE_MAX`]. Refinement then runs `depth` passes, pass
//! `k` counting down from `depth` to 1, each adding the periodic correction
//! `(index % frequency) * 10 / k`. The most refined pass (`k = 1`) is applied
//! last. Finally every sample is multiplied by `scale`.
//!
//! Refinement is a plain loop, so stack usage does not depend on `depth`.
//! Requests above the generator's maximum depth skip refinement entirely and
//! return the scaled base buffer, flagged through [`Generation::depth_capped`].
//!
//! The random source is always supplied by the caller. Concurrent workers
//! each own one; tests pass a seeded [`rand_chacha::ChaCha8Rng`].

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::reductions;
use crate::types::{Signal, SignalParams};

/// Smallest base sample value (inclusive).
pub const BASE_MIN: i64 = 0;

/// Largest base sample value (inclusive).
pub const BASE_MAX: i64 = 100;

/// Default refinement cap.
pub const DEFAULT_MAX_DEPTH: u32 = 1000;

/// Amplitude of the periodic correction term before division by the pass number.
const CORRECTION_STEP: f64 = 10.0;

/// Output of a single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Generated samples, `params.length` long.
    pub data: Vec<f64>,
    /// Set when the requested depth exceeded the cap and refinement was skipped.
    pub depth_capped: bool,
}

/// Generates signal buffers with a configurable refinement cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalGenerator {
    max_depth: u32,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl SignalGenerator {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Draw the unrefined base buffer.
    pub fn base<R: Rng + ?Sized>(length: usize, rng: &mut R) -> Vec<f64> {
        (0..length)
            .map(|_| rng.gen_range(BASE_MIN..=BASE_MAX) as f64)
            .collect()
    }

    /// Generate one buffer for `params`.
    ///
    /// Fails on invalid parameters, and on a `scale` large enough to push a
    /// sample past the `f64` range. Exceeding the depth cap is not an error:
    /// the scaled base is returned with `depth_capped` set.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        params: &SignalParams,
        rng: &mut R,
    ) -> Result<Generation> {
        params.validate()?;

        let mut data = Self::base(params.length, rng);
        let depth_capped = params.depth > self.max_depth;

        if depth_capped {
            warn!(
                depth = params.depth,
                max_depth = self.max_depth,
                "Refinement depth exceeds cap, using base buffer"
            );
        } else {
            refine(&mut data, params.frequency, params.depth);
        }

        for sample in &mut data {
            *sample *= params.scale;
        }
        if let Some(index) = data.iter().position(|v| !v.is_finite()) {
            return Err(Error::invalid(
                "scale",
                format!("{} overflows sample #{index}", params.scale),
            ));
        }

        debug!(
            length = params.length,
            depth = params.depth,
            scale = params.scale,
            "Signal buffer generated"
        );

        Ok(Generation { data, depth_capped })
    }

    /// Generate a complete [`Signal`] carrying `params`.
    pub fn signal<R: Rng + ?Sized>(&self, params: SignalParams, rng: &mut R) -> Result<Signal> {
        let generation = self.generate(&params, rng)?;
        Signal::from_parts(params, generation.data)
    }
}

/// Apply `depth` refinement passes in place, coarsest first.
///
/// `frequency` must be non-zero.
fn refine(data: &mut [f64], frequency: usize, depth: u32) {
    for pass in (1..=depth).rev() {
        let divisor = f64::from(pass);
        for (index, sample) in data.iter_mut().enumerate() {
            *sample += (index % frequency) as f64 * CORRECTION_STEP / divisor;
        }
    }
}

/// Mean and population standard deviation (divisor `N`) of `data`.
pub fn analyze(data: &[f64]) -> (f64, f64) {
    (reductions::mean(data), reductions::population_std(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn seeded(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn test_output_has_requested_length() {
        let generator = SignalGenerator::default();
        let mut rng = seeded(1);
        for length in [1, 2, 7, 20, 500] {
            for depth in [0, 1, 3, 10] {
                let params = SignalParams::new(length, 5, 1.5, depth);
                let generation = generator.generate(&params, &mut rng).unwrap();
                assert_eq!(generation.data.len(), length);
            }
        }
    }

    #[test]
    fn test_base_values_within_range() {
        let base = SignalGenerator::base(1000, &mut seeded(2));
        assert!(
            base.iter()
                .all(|v| (BASE_MIN as f64..=BASE_MAX as f64).contains(v) && v.fract() == 0.0)
        );
    }

    #[test]
    fn test_depth_zero_is_scaled_base() {
        let base = SignalGenerator::base(12, &mut seeded(3));
        let params = SignalParams::new(12, 5, 2.5, 0);
        let generation = SignalGenerator::default()
            .generate(&params, &mut seeded(3))
            .unwrap();

        let expected: Vec<f64> = base.iter().map(|v| v * 2.5).collect();
        assert_eq!(generation.data, expected);
        assert!(!generation.depth_capped);
    }

    #[test]
    fn test_single_pass_adds_periodic_pattern() {
        let base = SignalGenerator::base(7, &mut seeded(4));
        let params = SignalParams::new(7, 3, 2.0, 1);
        let generation = SignalGenerator::default()
            .generate(&params, &mut seeded(4))
            .unwrap();

        let pattern = [0.0, 10.0, 20.0, 0.0, 10.0, 20.0, 0.0];
        let expected: Vec<f64> = base
            .iter()
            .zip(pattern)
            .map(|(b, p)| (b + p) * 2.0)
            .collect();
        assert_eq!(generation.data, expected);
    }

    #[test]
    fn test_two_passes_apply_half_then_full_correction() {
        let mut data = vec![0.0; 4];
        refine(&mut data, 4, 2);
        // index * 10 / 2 + index * 10 / 1
        assert_eq!(data, vec![0.0, 15.0, 30.0, 45.0]);
    }

    #[test]
    fn test_zero_scale_yields_zeros() {
        let params = SignalParams::new(9, 5, 0.0, 3);
        let generation = SignalGenerator::default()
            .generate(&params, &mut seeded(5))
            .unwrap();
        assert!(generation.data.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_depth_cap_falls_back_to_scaled_base() {
        let base = SignalGenerator::base(5, &mut seeded(6));
        let params = SignalParams::new(5, 5, 1.0, 1_000_000);

        let start = std::time::Instant::now();
        let generation = SignalGenerator::default()
            .generate(&params, &mut seeded(6))
            .unwrap();

        assert!(start.elapsed() < std::time::Duration::from_secs(1));
        assert!(generation.depth_capped);
        assert_eq!(generation.data, base);
    }

    #[test]
    fn test_depth_at_cap_still_refines() {
        let generator = SignalGenerator::new(4);
        let params = SignalParams::new(3, 2, 1.0, 4);
        let generation = generator.generate(&params, &mut seeded(7)).unwrap();
        assert!(!generation.depth_capped);
    }

    #[test]
    fn test_invalid_parameters_fail_fast() {
        let generator = SignalGenerator::default();
        let mut rng = seeded(8);

        let err = generator
            .generate(&SignalParams::new(0, 5, 1.0, 1), &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "length", .. }));

        let err = generator
            .generate(&SignalParams::new(5, 0, 1.0, 1), &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameter {
                name: "frequency",
                ..
            }
        ));
    }

    #[test]
    fn test_overflowing_scale_is_rejected() {
        // Index 1 refines to at least 18.3, and 18.3 * 1e307 exceeds f64::MAX.
        let params = SignalParams::new(5, 5, 1e307, 3);
        let err = SignalGenerator::default()
            .signal(params, &mut seeded(10))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "scale", .. }));

        let huge_but_safe = SignalParams::new(5, 5, 1e300, 3);
        let signal = SignalGenerator::default()
            .signal(huge_but_safe, &mut seeded(10))
            .unwrap();
        assert!(signal.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_same_seed_same_signal() {
        let generator = SignalGenerator::default();
        let params = SignalParams::new(32, 5, 0.3, 3);
        let a = generator.signal(params, &mut seeded(9)).unwrap();
        let b = generator.signal(params, &mut seeded(9)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.params(), &params);
    }

    #[test]
    fn test_analyze_uses_population_divisor() {
        let (mean, std) = analyze(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(mean, 30.0);
        assert!((std - 14.142135623730951).abs() < 1e-12);
    }
}
