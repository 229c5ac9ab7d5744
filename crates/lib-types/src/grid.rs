//! Frequency grids.
//!
//! Every analysis in the kernel runs on a one-sided grid of angular
//! frequencies ω₀ < ω₁ < … < ω_{n-1}, all strictly positive. The grid is
//! validated once at construction and is immutable afterwards, so downstream
//! operators can precompute grid-dependent state without re-checking it.
//!
//! The grid need not be uniform. Quadrature helpers ([`FrequencyGrid::trapezoid_weights`],
//! [`FrequencyGrid::cell_widths`]) account for variable spacing.

use crate::error::GridError;
use serde::{Deserialize, Serialize};

/// Minimum number of points for a usable grid.
pub const MIN_GRID_POINTS: usize = 2;

/// Validated, strictly positive, strictly increasing frequency grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FrequencyGrid {
    omega: Vec<f64>,
}

impl FrequencyGrid {
    /// Build a grid from raw frequencies.
    ///
    /// # Errors
    ///
    /// Returns a [`GridError`] if there are fewer than two points, or any
    /// frequency is non-finite, non-positive, or out of order.
    pub fn new(omega: Vec<f64>) -> Result<Self, GridError> {
        if omega.len() < MIN_GRID_POINTS {
            return Err(GridError::TooShort {
                needed: MIN_GRID_POINTS,
                got: omega.len(),
            });
        }

        for (index, &value) in omega.iter().enumerate() {
            if !value.is_finite() {
                return Err(GridError::NonFinite { index });
            }
            if value <= 0.0 {
                return Err(GridError::NonPositive { index, value });
            }
            if index > 0 && value <= omega[index - 1] {
                return Err(GridError::NotIncreasing { index });
            }
        }

        Ok(Self { omega })
    }

    /// Evenly spaced grid from `start` to `stop` inclusive.
    pub fn linspace(start: f64, stop: f64, num_points: usize) -> Result<Self, GridError> {
        if num_points < MIN_GRID_POINTS {
            return Err(GridError::TooShort {
                needed: MIN_GRID_POINTS,
                got: num_points,
            });
        }
        let step = (stop - start) / (num_points - 1) as f64;
        Self::new((0..num_points).map(|i| start + i as f64 * step).collect())
    }

    /// Number of frequency points.
    #[inline]
    pub fn len(&self) -> usize {
        self.omega.len()
    }

    /// Always false; a valid grid has at least two points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.omega.is_empty()
    }

    /// Frequencies as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.omega
    }

    /// Lowest frequency.
    #[inline]
    pub fn omega_min(&self) -> f64 {
        self.omega[0]
    }

    /// Highest frequency.
    #[inline]
    pub fn omega_max(&self) -> f64 {
        self.omega[self.omega.len() - 1]
    }

    /// Spacing between the last two points.
    #[inline]
    pub fn last_spacing(&self) -> f64 {
        let n = self.omega.len();
        self.omega[n - 1] - self.omega[n - 2]
    }

    /// Upper edge of the last quadrature cell, ω_max + Δ_last / 2.
    #[inline]
    pub fn upper_edge(&self) -> f64 {
        self.omega_max() + 0.5 * self.last_spacing()
    }

    /// Check whether all spacings agree within a relative tolerance.
    pub fn is_uniform(&self, rel_tol: f64) -> bool {
        let mean = (self.omega_max() - self.omega_min()) / (self.omega.len() - 1) as f64;
        self.omega
            .windows(2)
            .all(|w| ((w[1] - w[0]) - mean).abs() <= rel_tol * mean)
    }

    /// Trapezoidal-rule weights (half cells at both ends).
    pub fn trapezoid_weights(&self) -> Vec<f64> {
        self.weights(true)
    }

    /// Cell widths: centred spacing in the interior, full spacing at the ends.
    pub fn cell_widths(&self) -> Vec<f64> {
        self.weights(false)
    }

    fn weights(&self, half_ends: bool) -> Vec<f64> {
        let w = &self.omega;
        let n = w.len();
        let end_scale = if half_ends { 0.5 } else { 1.0 };

        (0..n)
            .map(|j| {
                if j == 0 {
                    end_scale * (w[1] - w[0])
                } else if j == n - 1 {
                    end_scale * (w[n - 1] - w[n - 2])
                } else {
                    0.5 * (w[j + 1] - w[j - 1])
                }
            })
            .collect()
    }

    /// Trapezoidal integral of `values` over the grid.
    pub fn integrate(&self, values: &[f64]) -> Result<f64, GridError> {
        self.check_len(values.len())?;
        Ok(self
            .omega
            .windows(2)
            .zip(values.windows(2))
            .map(|(w, v)| 0.5 * (v[0] + v[1]) * (w[1] - w[0]))
            .sum())
    }

    /// Ensure a value array lines up with the grid.
    pub fn check_len(&self, actual: usize) -> Result<(), GridError> {
        if actual != self.omega.len() {
            return Err(GridError::LengthMismatch {
                expected: self.omega.len(),
                actual,
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<f64>> for FrequencyGrid {
    type Error = GridError;

    fn try_from(omega: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(omega)
    }
}

impl From<FrequencyGrid> for Vec<f64> {
    fn from(grid: FrequencyGrid) -> Self {
        grid.omega
    }
}

impl AsRef<[f64]> for FrequencyGrid {
    fn as_ref(&self) -> &[f64] {
        &self.omega
    }
}
