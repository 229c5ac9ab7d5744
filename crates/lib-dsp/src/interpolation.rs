//! Linear interpolation between frequency grids.

use crate::error::{check_len, DspError, DspResult};

/// Bracket of a target point: `value = ys[lower]·(1 − frac) + ys[lower + 1]·frac`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Bracket {
    lower: usize,
    frac: f64,
}

/// Linear interpolation from a fixed source grid onto fixed target points.
///
/// Brackets are located once at construction, so repeated resampling of
/// different value arrays costs O(targets). Targets outside the source range
/// are clamped to the end values.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearInterpolator {
    source_len: usize,
    brackets: Vec<Bracket>,
}

impl LinearInterpolator {
    /// Build an interpolator from ascending `source` points onto `targets`.
    pub fn new(source: &[f64], targets: &[f64]) -> DspResult<Self> {
        if source.len() < 2 {
            return Err(DspError::InsufficientData {
                needed: 2,
                got: source.len(),
            });
        }

        let brackets = targets.iter().map(|&t| locate(source, t)).collect();
        Ok(Self {
            source_len: source.len(),
            brackets,
        })
    }

    /// Number of target points.
    pub fn target_len(&self) -> usize {
        self.brackets.len()
    }

    /// Resample `values` (defined on the source grid) onto the targets.
    pub fn apply(&self, values: &[f64]) -> DspResult<Vec<f64>> {
        check_len(self.source_len, values.len())?;
        Ok(self
            .brackets
            .iter()
            .map(|b| {
                if b.frac == 0.0 {
                    values[b.lower]
                } else {
                    values[b.lower] * (1.0 - b.frac) + values[b.lower + 1] * b.frac
                }
            })
            .collect())
    }
}

/// Find the bracketing interval of `target` by binary search.
fn locate(xs: &[f64], target: f64) -> Bracket {
    let last = xs.len() - 1;
    if target <= xs[0] {
        return Bracket { lower: 0, frac: 0.0 };
    }
    if target >= xs[last] {
        return Bracket { lower: last, frac: 0.0 };
    }

    let mut lower = 0;
    let mut upper = last;
    while upper - lower > 1 {
        let mid = (lower + upper) / 2;
        if xs[mid] <= target {
            lower = mid;
        } else {
            upper = mid;
        }
    }

    let frac = (target - xs[lower]) / (xs[upper] - xs[lower]);
    Bracket { lower, frac }
}

/// Uniform grid `(k + 1)·Δ`, `k = 0..count`, with `Δ = upper / count`.
///
/// The grid starts one step above zero and ends exactly at `upper`.
pub fn uniform_positive_grid(upper: f64, count: usize) -> Vec<f64> {
    let step = upper / count as f64;
    (0..count).map(|k| (k + 1) as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_interpolation() {
        let xs = vec![1.0, 2.0, 3.0];
        let ys = vec![1.0, 0.5, 0.0];

        let result = LinearInterpolator::new(&xs, &[1.5, 2.75]).unwrap().apply(&ys).unwrap();
        assert!((result[0] - 0.75).abs() < 1e-12);
        assert!((result[1] - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_clamped_ends() {
        let xs = vec![1.0, 2.0];
        let ys = vec![4.0, 6.0];
        let interp = LinearInterpolator::new(&xs, &[0.1, 2.0, 9.0]).unwrap();
        let result = interp.apply(&ys).unwrap();
        assert_eq!(result, vec![4.0, 6.0, 6.0]);
    }

    #[test]
    fn test_reuse_and_length_check() {
        let xs = vec![0.0, 1.0, 2.0, 3.0];
        let interp = LinearInterpolator::new(&xs, &[0.5, 2.5]).unwrap();
        assert_eq!(interp.target_len(), 2);

        let a = interp.apply(&[0.0, 1.0, 2.0, 3.0]).unwrap();
        let b = interp.apply(&[3.0, 3.0, 3.0, 3.0]).unwrap();
        assert_eq!(a, vec![0.5, 2.5]);
        assert_eq!(b, vec![3.0, 3.0]);

        assert!(matches!(
            interp.apply(&[1.0, 2.0]),
            Err(DspError::LengthMismatch { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_uniform_positive_grid() {
        let grid = uniform_positive_grid(5.0, 4);
        assert_eq!(grid, vec![1.25, 2.5, 3.75, 5.0]);
    }
}
