//! Validation errors for grids and spectral data.

use thiserror::Error;

/// Errors raised while constructing a [`FrequencyGrid`](crate::FrequencyGrid)
/// or binding values to one.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GridError {
    /// Too few frequency points to define a grid.
    #[error("Frequency grid needs at least {needed} points, got {got}")]
    TooShort { needed: usize, got: usize },

    /// A frequency is NaN or infinite.
    #[error("Frequency at index {index} is not finite")]
    NonFinite { index: usize },

    /// A frequency is zero or negative.
    #[error("Frequency at index {index} must be strictly positive, got {value}")]
    NonPositive { index: usize, value: f64 },

    /// Frequencies are not strictly increasing.
    #[error("Frequencies must be strictly increasing (violated at index {index})")]
    NotIncreasing { index: usize },

    /// Value array does not match the grid length.
    #[error("Length mismatch: grid has {expected} points, got {actual} values")]
    LengthMismatch { expected: usize, actual: usize },
}
