//! Core signal types.
//!
//! A [`Signal`] pairs its generation parameters ([`SignalParams`]) with the
//! sample buffer they produced. Signals are immutable once built: the only
//! ways to obtain one are fresh generation
//! ([`SignalGenerator::signal`](crate::generator::SignalGenerator::signal))
//! or rehydration from a checkpoint ([`Signal::from_parts`]).

use crate::error::{Error, Result};

/// Default number of samples per signal.
pub const DEFAULT_LENGTH: usize = 10;

/// Default modulus of the periodic correction pattern.
pub const DEFAULT_FREQUENCY: usize = 5;

/// Default refinement depth.
pub const DEFAULT_DEPTH: u32 = 3;

/// Parameters that fully describe how a signal was generated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalParams {
    /// Number of samples.
    pub length: usize,
    /// Modulus for the periodic correction term.
    pub frequency: usize,
    /// Linear multiplier applied after refinement.
    pub scale: f64,
    /// Number of refinement passes.
    pub depth: u32,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            frequency: DEFAULT_FREQUENCY,
            scale: 1.0,
            depth: DEFAULT_DEPTH,
        }
    }
}

impl SignalParams {
    pub fn new(length: usize, frequency: usize, scale: f64, depth: u32) -> Self {
        Self {
            length,
            frequency,
            scale,
            depth,
        }
    }

    /// Check the generation contract.
    ///
    /// Fails on `length == 0`, `frequency == 0` or a non-finite `scale`.
    pub fn validate(&self) -> Result<()> {
        if self.length == 0 {
            return Err(Error::invalid("length", "must be greater than zero"));
        }
        if self.frequency == 0 {
            return Err(Error::invalid("frequency", "must be greater than zero"));
        }
        if !self.scale.is_finite() {
            return Err(Error::invalid(
                "scale",
                format!("must be finite, got {}", self.scale),
            ));
        }
        Ok(())
    }
}

/// One generated dataset together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    params: SignalParams,
    data: Vec<f64>,
}

impl Signal {
    /// Assemble a signal from parameters and an existing sample buffer.
    ///
    /// Used when rehydrating checkpoints. The buffer is taken verbatim and
    /// must hold exactly `params.length` finite samples.
    pub fn from_parts(params: SignalParams, data: Vec<f64>) -> Result<Self> {
        params.validate()?;
        if data.len() != params.length {
            return Err(Error::LengthMismatch {
                expected: params.length,
                actual: data.len(),
            });
        }
        if let Some((index, &value)) = data.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(Error::NonFiniteSample { index, value });
        }
        Ok(Self { params, data })
    }

    pub fn params(&self) -> &SignalParams {
        &self.params
    }

    pub fn length(&self) -> usize {
        self.params.length
    }

    pub fn frequency(&self) -> usize {
        self.params.frequency
    }

    pub fn scale(&self) -> f64 {
        self.params.scale
    }

    pub fn depth(&self) -> u32 {
        self.params.depth
    }

    /// Sample buffer, in generation order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Mean and population standard deviation of this signal's samples.
    pub fn analyze(&self) -> (f64, f64) {
        crate::generator::analyze(&self.data)
    }
}
