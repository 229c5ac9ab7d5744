//! Real FFT plans and the quadrature (Hilbert) filter.
//!
//! This module wraps realfft with:
//! - Planner caching for repeated plan construction
//! - A precomputed [`QuadratureFilter`] that applies the −i·sign(k)
//!   multiplier to zero-padded real data

use crate::error::{DspError, DspResult};
use num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// FFT engine with a cached real planner.
pub struct FftEngine {
    real_planner: RealFftPlanner<f64>,
}

impl FftEngine {
    /// Create a new FFT engine.
    pub fn new() -> Self {
        Self {
            real_planner: RealFftPlanner::new(),
        }
    }

    /// Plan a quadrature filter of the given (power-of-two) length.
    pub fn quadrature_filter(&mut self, len: usize) -> DspResult<QuadratureFilter> {
        if len < 2 || !len.is_power_of_two() {
            return Err(DspError::InvalidFftSize(len));
        }

        Ok(QuadratureFilter {
            len,
            forward: self.real_planner.plan_fft_forward(len),
            inverse: self.real_planner.plan_fft_inverse(len),
        })
    }
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Padded transform length for `n` samples: the next power of two ≥ 2n.
#[inline]
pub fn padded_len(n: usize) -> usize {
    (2 * n).next_power_of_two().max(2)
}

/// Periodic discrete Hilbert transform of fixed length.
///
/// Plans are built once and shared; `apply` only allocates scratch buffers,
/// so a filter can be used concurrently from several threads.
#[derive(Clone)]
pub struct QuadratureFilter {
    len: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
}

impl QuadratureFilter {
    /// Transform length.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Apply the filter to `signal`, zero-padded to the filter length.
    ///
    /// Bins 1..N/2 are multiplied by −i; DC and Nyquist are removed. The full
    /// periodic output of length N is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DspError::InsufficientData`] if the signal does not fit in
    /// the filter length.
    pub fn apply(&self, signal: &[f64]) -> DspResult<Vec<f64>> {
        if signal.len() > self.len {
            return Err(DspError::InsufficientData {
                needed: signal.len(),
                got: self.len,
            });
        }

        let mut input = self.forward.make_input_vec();
        input[..signal.len()].copy_from_slice(signal);
        let mut spectrum = self.forward.make_output_vec();

        self.forward
            .process(&mut input, &mut spectrum)
            .map_err(|e| DspError::NumericalInstability(e.to_string()))?;

        let nyquist = spectrum.len() - 1;
        spectrum[0] = Complex64::new(0.0, 0.0);
        spectrum[nyquist] = Complex64::new(0.0, 0.0);
        for bin in spectrum[1..nyquist].iter_mut() {
            // (a + ib)·(−i) = b − ia
            *bin = Complex64::new(bin.im, -bin.re);
        }

        let mut output = self.inverse.make_output_vec();
        self.inverse
            .process(&mut spectrum, &mut output)
            .map_err(|e| DspError::NumericalInstability(e.to_string()))?;

        // Normalize
        let scale = 1.0 / self.len as f64;
        for x in output.iter_mut() {
            *x *= scale;
        }

        Ok(output)
    }
}

impl std::fmt::Debug for QuadratureFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadratureFilter").field("len", &self.len).finish()
    }
}
