//! Edge tapers for extended spectra.
//!
//! The FFT-based Hilbert strategies treat the extended spectrum as one period
//! of a periodic signal. A short taper at both ends of the extension softens
//! the jump at ±ω_max, which otherwise rings through the whole transform.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function used for edge tapering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    /// No tapering.
    Rectangular,

    /// Hann (raised cosine) window.
    #[default]
    Hann,

    /// Hamming window; does not reach zero at the edge.
    Hamming,

    /// Blackman window; steepest roll-off of the set.
    Blackman,
}

/// Generate window coefficients for a given window type and length.
///
/// The window is symmetric and peaks at 1.0 in the centre.
///
/// # Arguments
///
/// * `window_type` - Type of window function to generate
/// * `length` - Number of points in the window
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    if length == 0 {
        return Vec::new();
    }
    if length == 1 {
        return vec![1.0];
    }

    let n = length as f64;
    (0..length)
        .map(|i| {
            let x = i as f64 / (n - 1.0);
            match window_type {
                WindowType::Rectangular => 1.0,
                WindowType::Hann => 0.5 * (1.0 - (2.0 * PI * x).cos()),
                WindowType::Hamming => 0.54 - 0.46 * (2.0 * PI * x).cos(),
                WindowType::Blackman => {
                    0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
                }
            }
        })
        .collect()
}

/// Number of taper samples for `data_length` points and a taper fraction.
///
/// Zero fraction disables tapering.
pub fn taper_length(data_length: usize, taper_fraction: f64) -> usize {
    if taper_fraction <= 0.0 || data_length == 0 {
        return 0;
    }
    (data_length as f64 * taper_fraction).ceil() as usize
}

/// Precomputed symmetric edge taper.
///
/// The rising half of a `2 * taper_len` window is applied to the first
/// `taper_len` samples and mirrored onto the last `taper_len` samples.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeTaper {
    ramp: Vec<f64>,
}

impl EdgeTaper {
    pub fn new(window_type: WindowType, taper_len: usize) -> Self {
        let mut ramp = generate_window(window_type, 2 * taper_len);
        ramp.truncate(taper_len);
        Self { ramp }
    }

    /// Taper length in samples at each end.
    #[inline]
    pub fn len(&self) -> usize {
        self.ramp.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ramp.is_empty()
    }

    /// Apply in place. Sequences shorter than two ramps are tapered as far as
    /// they reach from each side.
    pub fn apply(&self, data: &mut [f64]) {
        let m = data.len();
        let reach = self.ramp.len().min(m / 2);
        for (i, &w) in self.ramp.iter().take(reach).enumerate() {
            data[i] *= w;
            data[m - 1 - i] *= w;
        }
    }
}
