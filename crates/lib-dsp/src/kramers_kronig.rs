//! Kramers-Kronig relations between the real and imaginary parts of a
//! causal response.
//!
//! For a causal response σ(ω) = σ1(ω) + iσ2(ω) with real impulse response,
//! σ1 is even and σ2 is odd in ω, and the two are a Hilbert pair:
//!
//! ```text
//! σ2(ω) = −H[σ1](ω)        (forward)
//! σ1(ω) =  H[σ2](ω)        (backward)
//! ```
//!
//! The forward relation is evaluated as the even-parity transform, which on
//! the dense strategies is literally `−ω·H[σ1(ω')/ω']` with ω floored at
//! [`OMEGA_FLOOR`](crate::hilbert::OMEGA_FLOOR). The backward relation is the
//! odd-parity transform.
//!
//! # Tail correction
//!
//! Measured spectra stop at ω_max, but the integrals run to infinity. With
//! tail correction enabled the data beyond `W = ω_max + Δ/2` is modelled as
//! the leading high-frequency behaviour of a response, σ1 ≈ a/ω² and
//! σ2 ≈ c/ω, with `a` and `c` averaged over the trailing samples. The
//! closed-form contribution of that tail is added to each relation. Without
//! it, truncation dominates the backward error for slowly decaying σ2.

use crate::error::{check_len, DspError, DspResult};
use crate::hilbert::{relative_error, HilbertConfig, HilbertTransform, TransformMethod};
use lib_types::{ConsistencyReport, FrequencyGrid};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Settings for the KK relations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KkConfig {
    /// Settings for the underlying Hilbert transform.
    #[serde(default)]
    pub hilbert: HilbertConfig,

    /// Add the analytic contribution of a power-law tail beyond ω_max.
    #[serde(default = "default_true")]
    pub tail_correction: bool,

    /// Fraction of trailing samples used to fit the tail amplitude.
    #[serde(default = "default_tail_fraction")]
    pub tail_fraction: f64,
}

fn default_true() -> bool { true }
fn default_tail_fraction() -> f64 { 0.05 }

impl Default for KkConfig {
    fn default() -> Self {
        Self {
            hilbert: HilbertConfig::default(),
            tail_correction: true,
            tail_fraction: default_tail_fraction(),
        }
    }
}

impl KkConfig {
    pub fn validate(&self) -> DspResult<()> {
        self.hilbert.validate()?;
        if !(self.tail_fraction > 0.0 && self.tail_fraction <= 1.0) {
            return Err(DspError::InvalidConfig(format!(
                "tail_fraction must be in (0, 1], got {}",
                self.tail_fraction
            )));
        }
        Ok(())
    }
}

/// Forward/backward KK transforms on a fixed grid.
#[derive(Debug)]
pub struct KramersKronig {
    hilbert: HilbertTransform,
    tail: Option<TailModel>,
}

/// Power-law continuation of the data beyond the last grid cell.
#[derive(Clone, Copy, Debug)]
struct TailModel {
    upper_edge: f64,
    points: usize,
}

impl KramersKronig {
    /// KK relations with the default configuration.
    pub fn new(grid: &FrequencyGrid, method: TransformMethod) -> DspResult<Self> {
        Self::with_config(grid, method, &KkConfig::default())
    }

    pub fn with_config(
        grid: &FrequencyGrid,
        method: TransformMethod,
        config: &KkConfig,
    ) -> DspResult<Self> {
        config.validate()?;
        let hilbert = HilbertTransform::with_config(grid, method, &config.hilbert)?;

        let tail = config.tail_correction.then(|| {
            let n = grid.len();
            let points = ((config.tail_fraction * n as f64).ceil() as usize).clamp(2, n);
            TailModel {
                upper_edge: grid.upper_edge(),
                points,
            }
        });

        Ok(Self { hilbert, tail })
    }

    pub fn grid(&self) -> &FrequencyGrid {
        self.hilbert.grid()
    }

    pub fn method(&self) -> TransformMethod {
        self.hilbert.method()
    }

    /// Underlying Hilbert transform.
    pub fn hilbert(&self) -> &HilbertTransform {
        &self.hilbert
    }

    /// σ2 reconstructed from σ1.
    pub fn forward(&self, sigma1: &[f64]) -> DspResult<Vec<f64>> {
        let mut sigma2: Vec<f64> = self
            .hilbert
            .transform_even(sigma1)?
            .into_iter()
            .map(|v| -v)
            .collect();

        if let Some(tail) = self.tail {
            let omega = self.grid().as_slice();
            let a = tail.mean_moment(omega, sigma1, 2);
            let w = tail.upper_edge;
            for (out, &x) in sigma2.iter_mut().zip(omega) {
                let r = x / w;
                *out += 2.0 * a / (PI * x * w) * atanh_ratio_minus_one(r);
            }
        }

        Ok(sigma2)
    }

    /// σ1 reconstructed from σ2.
    pub fn backward(&self, sigma2: &[f64]) -> DspResult<Vec<f64>> {
        let mut sigma1 = self.hilbert.transform(sigma2)?;

        if let Some(tail) = self.tail {
            let omega = self.grid().as_slice();
            let c = tail.mean_moment(omega, sigma2, 1);
            let w = tail.upper_edge;
            for (out, &x) in sigma1.iter_mut().zip(omega) {
                *out -= 2.0 * c / (PI * x) * (x / w).atanh();
            }
        }

        Ok(sigma1)
    }

    /// Relative forward and backward reconstruction errors of a pair.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::LengthMismatch`] if either array does not match
    /// the grid.
    pub fn check_consistency(
        &self,
        sigma1: &[f64],
        sigma2: &[f64],
        tol: f64,
    ) -> DspResult<ConsistencyReport> {
        let n = self.grid().len();
        check_len(n, sigma1.len())?;
        check_len(n, sigma2.len())?;

        let forward_error = relative_error(&self.forward(sigma1)?, sigma2);
        let backward_error = relative_error(&self.backward(sigma2)?, sigma1);

        Ok(ConsistencyReport::new(forward_error, backward_error, tol))
    }
}

impl TailModel {
    /// Mean of ωᵖ·f over the trailing samples.
    fn mean_moment(&self, omega: &[f64], f: &[f64], power: i32) -> f64 {
        let n = omega.len();
        let start = n - self.points;
        let total: f64 = omega[start..]
            .iter()
            .zip(&f[start..])
            .map(|(w, v)| w.powi(power) * v)
            .sum();
        total / self.points as f64
    }
}

/// atanh(r)/r − 1, accurate for small r.
fn atanh_ratio_minus_one(r: f64) -> f64 {
    if r.abs() < 1e-4 {
        let r2 = r * r;
        r2 / 3.0 + r2 * r2 / 5.0
    } else {
        r.atanh() / r - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drude model σ = (ωp²/4π)·(γ − iω)/(ω² + γ²).
    fn drude(grid: &FrequencyGrid) -> (Vec<f64>, Vec<f64>) {
        let (wp, gamma) = (1.0, 0.1);
        let amp = wp * wp / (4.0 * PI);
        let s1 = grid.as_slice().iter().map(|w| amp * gamma / (w * w + gamma * gamma)).collect();
        let s2 = grid.as_slice().iter().map(|w| amp * -w / (w * w + gamma * gamma)).collect();
        (s1, s2)
    }

    #[test]
    fn test_drude_consistent_odd_fft() {
        let grid = FrequencyGrid::linspace(0.01, 5.0, 600).unwrap();
        let (s1, s2) = drude(&grid);
        let kk = KramersKronig::new(&grid, TransformMethod::OddFft).unwrap();

        let report = kk.check_consistency(&s1, &s2, 0.12).unwrap();
        assert!(
            report.consistent,
            "forward {:.4}, backward {:.4}",
            report.forward_error,
            report.backward_error
        );
    }

    #[test]
    fn test_drude_consistent_other_methods() {
        let grid = FrequencyGrid::linspace(0.01, 5.0, 600).unwrap();
        let (s1, s2) = drude(&grid);

        // Calibrated bounds; the dense kernels lose accuracy below the first point
        for (method, tol) in [
            (TransformMethod::OddFftUniform, 0.05),
            (TransformMethod::Kernel, 0.15),
            (TransformMethod::PvQuad, 0.2),
        ] {
            let kk = KramersKronig::new(&grid, method).unwrap();
            let report = kk.check_consistency(&s1, &s2, tol).unwrap();
            assert!(report.consistent, "{}: {:?}", method, report);
        }
    }

    #[test]
    fn test_scaled_pair_inconsistent() {
        let grid = FrequencyGrid::linspace(0.01, 5.0, 600).unwrap();
        let (s1, s2) = drude(&grid);
        let doubled: Vec<f64> = s2.iter().map(|v| 2.0 * v).collect();
        let kk = KramersKronig::new(&grid, TransformMethod::OddFft).unwrap();

        let report = kk.check_consistency(&s1, &doubled, 0.12).unwrap();
        assert!(!report.consistent);
        assert!(report.forward_error > 0.3);
        assert!(report.backward_error > 0.5);
    }

    #[test]
    fn test_tail_correction_reduces_backward_error() {
        let grid = FrequencyGrid::linspace(0.01, 5.0, 600).unwrap();
        let (s1, s2) = drude(&grid);

        let with_tail = KramersKronig::new(&grid, TransformMethod::OddFft).unwrap();
        let config = KkConfig {
            tail_correction: false,
            ..Default::default()
        };
        let without_tail =
            KramersKronig::with_config(&grid, TransformMethod::OddFft, &config).unwrap();

        let e_with = relative_error(&with_tail.backward(&s2).unwrap(), &s1);
        let e_without = relative_error(&without_tail.backward(&s2).unwrap(), &s1);
        assert!(e_with < 0.05, "tail-corrected backward error {:.4}", e_with);
        assert!(e_without > 2.0 * e_with);
    }

    #[test]
    fn test_length_mismatch() {
        let grid = FrequencyGrid::linspace(0.1, 1.0, 32).unwrap();
        let kk = KramersKronig::new(&grid, TransformMethod::Kernel).unwrap();
        assert!(matches!(
            kk.check_consistency(&[0.0; 32], &[0.0; 31], 0.1),
            Err(DspError::LengthMismatch { expected: 32, actual: 31 })
        ));
        assert!(kk.forward(&[0.0; 3]).is_err());
    }

    #[test]
    fn test_invalid_tail_fraction() {
        let grid = FrequencyGrid::linspace(0.1, 1.0, 32).unwrap();
        let config = KkConfig {
            tail_fraction: 0.0,
            ..Default::default()
        };
        assert!(KramersKronig::with_config(&grid, TransformMethod::OddFft, &config).is_err());
    }

    #[test]
    fn test_atanh_series_matches() {
        let r: f64 = 2e-4;
        let direct = r.atanh() / r - 1.0;
        assert!((atanh_ratio_minus_one(r) - direct).abs() < 1e-9);
        assert!((atanh_ratio_minus_one(5e-5) - 5e-5f64.powi(2) / 3.0).abs() < 1e-15);
    }
}
