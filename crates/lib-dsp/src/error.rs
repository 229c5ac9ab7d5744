//! Error types for DSP operations.

use lib_types::GridError;
use thiserror::Error;

/// Errors that can occur during DSP operations.
#[derive(Debug, Error)]
pub enum DspError {
    /// Frequency grid failed validation.
    #[error("Invalid frequency grid: {0}")]
    InvalidGrid(#[from] GridError),

    /// FFT size is not a power of 2.
    #[error("FFT size must be power of 2, got {0}")]
    InvalidFftSize(usize),

    /// Input length mismatch.
    #[error("Input length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Insufficient data for operation.
    #[error("Insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A configuration knob is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Numerical instability detected.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
}

/// Result type for DSP operations.
pub type DspResult<T> = Result<T, DspError>;

/// Check that an input array matches the expected length.
#[inline]
pub(crate) fn check_len(expected: usize, actual: usize) -> DspResult<()> {
    if expected != actual {
        return Err(DspError::LengthMismatch { expected, actual });
    }
    Ok(())
}
