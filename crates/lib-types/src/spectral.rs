//! Spectral values bound to a frequency grid.

use crate::error::GridError;
use crate::grid::FrequencyGrid;
use serde::{Deserialize, Serialize};

/// Real-valued spectral quantity sampled on a [`FrequencyGrid`].
///
/// Holds σ1, σ2 or a candidate density π. The length is checked against the
/// grid at construction; the values themselves are not constrained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectralFunction {
    values: Vec<f64>,
}

impl SpectralFunction {
    /// Bind values to a grid.
    pub fn on_grid(grid: &FrequencyGrid, values: Vec<f64>) -> Result<Self, GridError> {
        grid.check_len(values.len())?;
        Ok(Self { values })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// True if every value is finite and ≥ 0.
    pub fn is_non_negative(&self) -> bool {
        self.values.iter().all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl AsRef<[f64]> for SpectralFunction {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}
