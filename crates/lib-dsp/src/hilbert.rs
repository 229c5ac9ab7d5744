//! Discrete Hilbert transforms on one-sided frequency grids.
//!
//! The transform follows the convention
//!
//! ```text
//! H[g](x) = (1/π) · PV ∫ g(t) / (x − t) dt        (multiplier −i·sign(k))
//! ```
//!
//! Spectral data only exists for ω > 0, so every strategy needs to know how
//! the data continues to negative frequencies. [`HilbertTransform::transform`]
//! treats the input as the positive half of an **odd** function, which is the
//! one-sided form
//!
//! ```text
//! H[f](x) = (2/π) · PV ∫₀^∞ t·f(t) / (x² − t²) dt
//! ```
//!
//! and [`HilbertTransform::transform_even`] treats it as the positive half of
//! an **even** function, `(2/π)·x·PV ∫₀^∞ f(t) / (x² − t²) dt`.
//!
//! # Strategies
//!
//! | Method | Operator | Cost |
//! |--------|----------|------|
//! | `kernel` | dense matrix, cell-width quadrature | O(n²) build and apply |
//! | `pv_quad` | dense matrix, trapezoid weights, principal-value window | O(n²) |
//! | `fft` | zero-padded periodic transform of the raw samples | O(n log n) |
//! | `odd_fft` | FFT of the odd/even extension over [−ω_max, ω_max] | O(n log n) |
//! | `odd_fft_uniform` | `odd_fft` on a 4× oversampled uniform grid | O(n log n) |
//!
//! `fft` ignores parity and assumes a uniform grid; it is a reference for the
//! analytic-signal construction and is not accurate for one-sided KK work.
//!
//! All operators are built at construction and never mutated, so a
//! `HilbertTransform` can be shared across threads.
//!
//! # Accuracy
//!
//! Involution error ‖H(H(f)) + f‖/‖f‖ for a smooth, well-resolved wave packet
//! on 512 uniform points:
//!
//! | Method | typical | tested bound |
//! |--------|---------|--------------|
//! | `kernel`, `pv_quad` | 0.075 | 0.12 |
//! | `fft`, `odd_fft`, `odd_fft_uniform` | < 0.004 | 0.05 |

use crate::error::{check_len, DspError, DspResult};
use crate::fft::{padded_len, FftEngine, QuadratureFilter};
use crate::interpolation::{uniform_positive_grid, LinearInterpolator};
use crate::window::{taper_length, EdgeTaper, WindowType};
use lib_types::FrequencyGrid;
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_2_PI;
use std::fmt;
use std::str::FromStr;

/// Floor applied to frequencies before dividing by them.
pub const OMEGA_FLOOR: f64 = 1e-12;

/// Relative size of |ω_i² − ω_j²| below which a kernel pair is treated as
/// coincident.
const DEGENERATE_TOL: f64 = 1e-10;

/// Numerical strategy for the discrete Hilbert transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMethod {
    /// Dense kernel matrix with cell-width weights.
    Kernel,
    /// Dense kernel with trapezoid weights and a principal-value window.
    PvQuad,
    /// Zero-padded periodic FFT of the raw samples.
    Fft,
    /// FFT of the odd/even extension about ω = 0.
    #[default]
    OddFft,
    /// `OddFft` after resampling onto an oversampled uniform grid.
    OddFftUniform,
}

impl TransformMethod {
    /// Every strategy, in declaration order.
    pub const ALL: [TransformMethod; 5] = [
        TransformMethod::Kernel,
        TransformMethod::PvQuad,
        TransformMethod::Fft,
        TransformMethod::OddFft,
        TransformMethod::OddFftUniform,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::PvQuad => "pv_quad",
            Self::Fft => "fft",
            Self::OddFft => "odd_fft",
            Self::OddFftUniform => "odd_fft_uniform",
        }
    }

    /// Whether the operator is a dense O(n²) matrix.
    pub fn is_dense(self) -> bool {
        matches!(self, Self::Kernel | Self::PvQuad)
    }
}

impl fmt::Display for TransformMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformMethod {
    type Err = DspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| DspError::InvalidConfig(format!("unknown transform method '{}'", s)))
    }
}

/// Symmetry assumed for the data's continuation to ω < 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// f(−ω) = −f(ω), e.g. the imaginary part of a response.
    #[default]
    Odd,
    /// f(−ω) = f(ω), e.g. the real part of a response.
    Even,
}

/// Tuning for the FFT-based strategies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HilbertConfig {
    /// Window used for the edge taper of the extension.
    #[serde(default)]
    pub taper: WindowType,

    /// Fraction of the half-length tapered at each end (0 disables).
    #[serde(default = "default_taper_fraction")]
    pub taper_fraction: f64,

    /// Oversampling factor of the uniform grid used by `odd_fft_uniform`.
    #[serde(default = "default_oversample")]
    pub oversample: usize,
}

fn default_taper_fraction() -> f64 { 0.02 }
fn default_oversample() -> usize { 4 }

impl Default for HilbertConfig {
    fn default() -> Self {
        Self {
            taper: WindowType::default(),
            taper_fraction: default_taper_fraction(),
            oversample: default_oversample(),
        }
    }
}

impl HilbertConfig {
    /// Check that all knobs are in range.
    pub fn validate(&self) -> DspResult<()> {
        if !(0.0..0.5).contains(&self.taper_fraction) {
            return Err(DspError::InvalidConfig(format!(
                "taper_fraction must be in [0, 0.5), got {}",
                self.taper_fraction
            )));
        }
        if self.oversample == 0 {
            return Err(DspError::InvalidConfig(
                "oversample must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Discrete Hilbert transform bound to one frequency grid and one strategy.
pub struct HilbertTransform {
    grid: FrequencyGrid,
    method: TransformMethod,
    operator: Operator,
}

enum Operator {
    Dense(DenseKernel),
    Periodic(PeriodicTransform),
    Extension(ExtensionTransform),
    Resampled(ResampledTransform),
}

impl HilbertTransform {
    /// Build a transform with the default configuration.
    pub fn new(grid: &FrequencyGrid, method: TransformMethod) -> DspResult<Self> {
        Self::with_config(grid, method, &HilbertConfig::default())
    }

    /// Build a transform from raw frequencies, validating them first.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::InvalidGrid`] if the frequencies are not strictly
    /// positive and strictly increasing.
    pub fn from_frequencies(omega: &[f64], method: TransformMethod) -> DspResult<Self> {
        let grid = FrequencyGrid::new(omega.to_vec())?;
        Self::new(&grid, method)
    }

    /// Build a transform, precomputing the strategy's operator.
    ///
    /// # Arguments
    ///
    /// * `grid` - Frequency grid the transform operates on
    /// * `method` - Numerical strategy, fixed for the lifetime of the transform
    /// * `config` - Taper and oversampling settings for the FFT strategies
    pub fn with_config(
        grid: &FrequencyGrid,
        method: TransformMethod,
        config: &HilbertConfig,
    ) -> DspResult<Self> {
        config.validate()?;

        let mut engine = FftEngine::new();
        let n = grid.len();
        let operator = match method {
            TransformMethod::Kernel => Operator::Dense(DenseKernel::build(grid, false)?),
            TransformMethod::PvQuad => Operator::Dense(DenseKernel::build(grid, true)?),
            TransformMethod::Fft => Operator::Periodic(PeriodicTransform {
                filter: engine.quadrature_filter(padded_len(n))?,
                omega: floored(grid.as_slice()),
            }),
            TransformMethod::OddFft => {
                Operator::Extension(ExtensionTransform::new(&mut engine, n, config)?)
            }
            TransformMethod::OddFftUniform => {
                Operator::Resampled(ResampledTransform::new(&mut engine, grid, config)?)
            }
        };

        tracing::debug!(
            method = %method,
            points = n,
            uniform = grid.is_uniform(1e-6),
            "HilbertTransform ready"
        );

        Ok(Self {
            grid: grid.clone(),
            method,
            operator,
        })
    }

    /// Grid the transform is bound to.
    pub fn grid(&self) -> &FrequencyGrid {
        &self.grid
    }

    /// Strategy selected at construction.
    pub fn method(&self) -> TransformMethod {
        self.method
    }

    /// Hilbert transform of `f`, taken as the positive half of an odd function.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::LengthMismatch`] if `f` does not match the grid.
    pub fn transform(&self, f: &[f64]) -> DspResult<Vec<f64>> {
        self.apply(f, Parity::Odd)
    }

    /// Hilbert transform of `f`, taken as the positive half of an even function.
    pub fn transform_even(&self, f: &[f64]) -> DspResult<Vec<f64>> {
        self.apply(f, Parity::Even)
    }

    /// Hilbert transform of `f` under an explicit parity.
    pub fn apply(&self, f: &[f64], parity: Parity) -> DspResult<Vec<f64>> {
        check_len(self.grid.len(), f.len())?;

        match &self.operator {
            Operator::Dense(kernel) => Ok(kernel.apply(f, parity)),
            Operator::Periodic(periodic) => periodic.apply(f, parity),
            Operator::Extension(extension) => extension.apply(f, parity),
            Operator::Resampled(resampled) => resampled.apply(f, parity),
        }
    }
}

impl fmt::Debug for HilbertTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HilbertTransform")
            .field("method", &self.method)
            .field("points", &self.grid.len())
            .finish()
    }
}

fn floored(omega: &[f64]) -> Vec<f64> {
    omega.iter().map(|w| w.max(OMEGA_FLOOR)).collect()
}

/// Dense one-sided kernel.
///
/// `matrix[i, j] = (2/π)·ω_j·w_j / (ω_i² − ω_j²)` for j ≠ i. The segment
/// [0, ω₀] below the grid is integrated as one virtual node at ω₀/2, with
/// odd data extrapolated linearly to zero and even data held at f(ω₀).
struct DenseKernel {
    matrix: Array2<f64>,
    origin_odd: Array1<f64>,
    origin_even: Array1<f64>,
    omega: Array1<f64>,
}

impl DenseKernel {
    fn build(grid: &FrequencyGrid, principal_value: bool) -> DspResult<Self> {
        let omega = grid.as_slice();
        let n = omega.len();
        let weights = if principal_value {
            grid.trapezoid_weights()
        } else {
            grid.cell_widths()
        };

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| kernel_row(omega, &weights, i, principal_value))
            .collect();

        let matrix = Array2::from_shape_vec((n, n), rows.into_iter().flatten().collect())
            .map_err(|e| DspError::NumericalInstability(e.to_string()))?;

        let span = omega[0];
        let mid = 0.5 * span;
        let origin_odd = omega
            .iter()
            .map(|&x| FRAC_2_PI * mid * span * 0.5 / (x * x - mid * mid))
            .collect();
        let origin_even = omega
            .iter()
            .map(|&x| FRAC_2_PI * x * span / (x * x - mid * mid))
            .collect();

        Ok(Self {
            matrix,
            origin_odd,
            origin_even,
            omega: Array1::from(floored(omega)),
        })
    }

    fn apply(&self, f: &[f64], parity: Parity) -> Vec<f64> {
        let f0 = f[0];
        match parity {
            Parity::Odd => {
                let h = self.matrix.dot(&ArrayView1::from(f));
                (h + &self.origin_odd * f0).to_vec()
            }
            Parity::Even => {
                let g = &ArrayView1::from(f) / &self.omega;
                let h = self.matrix.dot(&g) * &self.omega;
                (h + &self.origin_even * f0).to_vec()
            }
        }
    }
}

/// One row of the dense kernel.
fn kernel_row(omega: &[f64], weights: &[f64], i: usize, principal_value: bool) -> Vec<f64> {
    let n = omega.len();
    let wi2 = omega[i] * omega[i];

    let mut row: Vec<f64> = (0..n)
        .map(|j| {
            if j == i {
                0.0
            } else {
                FRAC_2_PI * omega[j] * weights[j] / (wi2 - omega[j] * omega[j])
            }
        })
        .collect();

    if principal_value {
        // Exclude the nearest neighbours and hand their cell to the next ones out
        for step in [1isize, -1] {
            let near = i as isize + step;
            let next = i as isize + 2 * step;
            if near < 0 || near >= n as isize {
                continue;
            }
            if next >= 0 && next < n as isize {
                let (near, next) = (near as usize, next as usize);
                row[next] *= 1.0 + weights[near] / weights[next];
            }
            row[near as usize] = 0.0;
        }
    }

    // Coincident pairs: K_ij·f_j becomes the difference quotient K_ij·(f_j − f_i)
    let mut diagonal = 0.0;
    for j in 0..n {
        if j != i && row[j] != 0.0 && (wi2 - omega[j] * omega[j]).abs() <= DEGENERATE_TOL * wi2 {
            diagonal -= row[j];
        }
    }
    row[i] = diagonal;

    row
}

/// Plain periodic transform of the zero-padded samples.
struct PeriodicTransform {
    filter: QuadratureFilter,
    omega: Vec<f64>,
}

impl PeriodicTransform {
    fn apply(&self, f: &[f64], parity: Parity) -> DspResult<Vec<f64>> {
        let n = f.len();
        match parity {
            Parity::Odd => {
                let mut out = self.filter.apply(f)?;
                out.truncate(n);
                Ok(out)
            }
            Parity::Even => {
                let g: Vec<f64> = f.iter().zip(&self.omega).map(|(v, w)| v / w).collect();
                let out = self.filter.apply(&g)?;
                Ok(out.iter().zip(&self.omega).map(|(h, w)| h * w).collect())
            }
        }
    }
}

/// Transform of the symmetric extension `[±reverse(f), origin, f]`.
///
/// The periodic transform fixes its output only up to a constant, so the
/// value at the antipode of the extension centre (deep in the zero padding)
/// is pinned to zero.
struct ExtensionTransform {
    half_len: usize,
    filter: QuadratureFilter,
    taper: EdgeTaper,
    pin_index: usize,
}

impl ExtensionTransform {
    fn new(engine: &mut FftEngine, half_len: usize, config: &HilbertConfig) -> DspResult<Self> {
        let ext_len = 2 * half_len + 1;
        let filter = engine.quadrature_filter(padded_len(ext_len))?;
        let pin_index = (half_len + filter.len() / 2) % filter.len();
        let taper = EdgeTaper::new(
            config.taper,
            taper_length(half_len, config.taper_fraction),
        );

        Ok(Self {
            half_len,
            filter,
            taper,
            pin_index,
        })
    }

    fn apply(&self, f: &[f64], parity: Parity) -> DspResult<Vec<f64>> {
        check_len(self.half_len, f.len())?;
        let n = self.half_len;

        let (sign, origin) = match parity {
            Parity::Odd => (-1.0, 0.0),
            Parity::Even => (1.0, f[0]),
        };

        let mut extended = Vec::with_capacity(2 * n + 1);
        extended.extend(f.iter().rev().map(|v| sign * v));
        extended.push(origin);
        extended.extend_from_slice(f);
        self.taper.apply(&mut extended);

        let out = self.filter.apply(&extended)?;
        let offset = out[self.pin_index];
        Ok(out[n + 1..2 * n + 1].iter().map(|v| v - offset).collect())
    }
}

/// Extension transform on a uniform grid `u_k = (k + 1)·ω_max / M`.
struct ResampledTransform {
    to_uniform: LinearInterpolator,
    from_uniform: LinearInterpolator,
    core: ExtensionTransform,
}

impl ResampledTransform {
    fn new(engine: &mut FftEngine, grid: &FrequencyGrid, config: &HilbertConfig) -> DspResult<Self> {
        let count = config.oversample * grid.len();
        let uniform = uniform_positive_grid(grid.omega_max(), count);

        Ok(Self {
            to_uniform: LinearInterpolator::new(grid.as_slice(), &uniform)?,
            from_uniform: LinearInterpolator::new(&uniform, grid.as_slice())?,
            core: ExtensionTransform::new(engine, count, config)?,
        })
    }

    fn apply(&self, f: &[f64], parity: Parity) -> DspResult<Vec<f64>> {
        let resampled = self.to_uniform.apply(f)?;
        let transformed = self.core.apply(&resampled, parity)?;
        self.from_uniform.apply(&transformed)
    }
}

/// Relative L2 distance ‖a − b‖ / ‖b‖.
///
/// A zero reference norm is floored so that identical zero vectors compare
/// as distance zero.
pub fn relative_error(a: &[f64], b: &[f64]) -> f64 {
    let diff: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    let reference: f64 = b.iter().map(|y| y * y).sum();
    diff.sqrt() / reference.sqrt().max(1e-300)
}
