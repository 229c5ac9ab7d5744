//! Error types for projection, optimization and gating.

use lib_dsp::DspError;
use lib_types::GridError;
use thiserror::Error;

/// Errors that can occur in the causal inference layer.
#[derive(Debug, Error)]
pub enum CausalError {
    /// Failure in the underlying transforms.
    #[error(transparent)]
    Dsp(#[from] DspError),

    /// Grid or length validation failed.
    #[error("Invalid spectral data: {0}")]
    Grid(#[from] GridError),

    /// Requested feature exists in the interface but has no implementation.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// A configuration knob is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for the causal inference layer.
pub type CausalResult<T> = Result<T, CausalError>;
