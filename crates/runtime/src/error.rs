//! Errors for signal generation.
//!
//! Only contract violations surface here. Degraded paths (enrichment
//! fallback, missing or malformed checkpoints) are handled where they occur
//! and never reach this type.
//!
//! # Error Categories
//!
//! - **Parameter errors**: [`Error::InvalidParameter`]
//! - **Data errors**: [`Error::LengthMismatch`], [`Error::NonFiniteSample`]

use thiserror::Error;

/// Runtime result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised directly to callers of the generator and signal constructors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A generation parameter is outside its valid domain.
    ///
    /// `length` and `frequency` must be positive and `scale` must be finite.
    /// Invalid values are rejected, never coerced.
    #[error("invalid parameter `{name}`: {message}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Description of the violated constraint.
        message: String,
    },

    /// A data buffer does not match the declared signal length.
    #[error("signal data has {actual} samples, expected {expected}")]
    LengthMismatch {
        /// Declared `length`.
        expected: usize,
        /// Number of samples actually supplied.
        actual: usize,
    },

    /// A data buffer holds NaN or an infinity, which a checkpoint cannot store.
    #[error("signal sample #{index} is not finite ({value})")]
    NonFiniteSample {
        /// Position of the first offending sample.
        index: usize,
        /// The offending value.
        value: f64,
    },
}

impl Error {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}
