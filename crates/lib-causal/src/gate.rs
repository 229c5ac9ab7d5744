//! Causality and sum-rule gate for measured σ1/σ2 pairs.
//!
//! The gate classifies data; it does not reject it. A pair that violates the
//! KK relations or carries no positive spectral weight comes back with
//! `status = FAIL` in the diagnostics. Only malformed input (wrong lengths,
//! bad grid) is returned as an error.

use crate::error::CausalResult;
use crate::projector::{KkProjector, ProjectorConfig};
use lib_dsp::{KramersKronig, TransformMethod};
use lib_types::{FrequencyGrid, GateChecks, GateDiagnostics, GateStatus};
use serde::{Deserialize, Serialize};

/// Minimum grid size before a tail offset is estimated.
const MIN_SUBTRACTION_POINTS: usize = 16;

/// Fraction of samples (offset) or of the range (heuristic) treated as tail.
const TAIL_FRACTION: f64 = 0.1;

/// Tail share of the total area above which subtraction is recommended.
const TAIL_WEIGHT_LIMIT: f64 = 0.2;

/// Settings for [`CausalityGate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub method: TransformMethod,

    /// Subtract a constant UV offset before the KK transforms.
    #[serde(default)]
    pub use_subtracted: bool,

    /// Project σ1 onto the causal subspace and rebuild σ2 from it.
    #[serde(default = "default_true")]
    pub enforce_projection: bool,

    /// Tolerance of the KK consistency gate.
    #[serde(default = "default_kk_tol")]
    pub kk_tol: f64,

    #[serde(default)]
    pub projector: ProjectorConfig,
}

fn default_true() -> bool { true }
fn default_kk_tol() -> f64 { 0.12 }

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            method: TransformMethod::default(),
            use_subtracted: false,
            enforce_projection: true,
            kk_tol: default_kk_tol(),
            projector: ProjectorConfig::default(),
        }
    }
}

/// Gate output: the (possibly modified) pair and the diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub sigma1: Vec<f64>,
    pub sigma2: Vec<f64>,
    pub diagnostics: GateDiagnostics,
}

/// Causality gate bound to a grid.
#[derive(Debug)]
pub struct CausalityGate {
    projector: KkProjector,
    config: GateConfig,
}

impl CausalityGate {
    pub fn new(grid: &FrequencyGrid, config: GateConfig) -> CausalResult<Self> {
        if !(config.kk_tol > 0.0 && config.kk_tol.is_finite()) {
            return Err(crate::CausalError::InvalidConfig(format!(
                "kk_tol must be positive and finite, got {}",
                config.kk_tol
            )));
        }
        let projector = KkProjector::with_config(grid, config.method, config.projector.clone())?;
        Ok(Self { projector, config })
    }

    pub fn grid(&self) -> &FrequencyGrid {
        self.projector.grid()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run the gate on a σ1/σ2 pair.
    ///
    /// 1. Baseline KK consistency of the raw pair.
    /// 2. Optional UV subtraction: the median of σ1 over the trailing 10% of
    ///    samples is removed (grids of at least 16 points only).
    /// 3. Optional projection: σ1 is clipped, projected, rescaled to its
    ///    clipped area, and σ2 is rebuilt with the forward relation.
    /// 4. The offset is restored and the f-sum and tail heuristic are taken
    ///    on the final σ1.
    ///
    /// # Errors
    ///
    /// Only for arrays that do not match the grid.
    pub fn run(&self, sigma1: &[f64], sigma2: &[f64]) -> CausalResult<GateOutcome> {
        let grid = self.grid();
        grid.check_len(sigma1.len())?;
        grid.check_len(sigma2.len())?;

        let kk: &KramersKronig = self.projector.relations();
        let tol = self.config.kk_tol;
        let before = kk.check_consistency(sigma1, sigma2, tol)?;

        let n = grid.len();
        let offset = if self.config.use_subtracted && n >= MIN_SUBTRACTION_POINTS {
            Some(tail_offset(sigma1))
        } else {
            None
        };
        let shift = offset.unwrap_or(0.0);
        let mut s1: Vec<f64> = sigma1.iter().map(|v| v - shift).collect();
        let mut s2 = sigma2.to_vec();

        let mut projection_iterations = 0;
        let after = if self.config.enforce_projection {
            let clipped: Vec<f64> = s1
                .iter()
                .map(|&v| if v.is_finite() { v.max(0.0) } else { 0.0 })
                .collect();
            let area = grid.integrate(&clipped)?;

            let projection = self.projector.project(&clipped)?;
            projection_iterations = projection.iterations;

            s1 = if area > 0.0 && area.is_finite() {
                projection.density.into_iter().map(|v| v * area).collect()
            } else {
                vec![0.0; n]
            };
            s2 = kk.forward(&s1)?;
            kk.check_consistency(&s1, &s2, tol)?
        } else if offset.is_some() {
            kk.check_consistency(&s1, &s2, tol)?
        } else {
            before
        };

        if shift != 0.0 {
            s1.iter_mut().for_each(|v| *v += shift);
        }

        let f_sum_area = f_sum_integral(grid, &s1)?;
        let gates = GateChecks {
            kk_consistency: after.consistent,
            f_sum_positive: f_sum_area > 0.0,
        };
        let status = if gates.all_pass() {
            GateStatus::Pass
        } else {
            GateStatus::Fail
        };

        if !status.is_pass() {
            tracing::warn!(
                forward_error = after.forward_error,
                backward_error = after.backward_error,
                f_sum_area,
                kk_consistency = gates.kk_consistency,
                "causality gate failed"
            );
        }

        let diagnostics = GateDiagnostics {
            before,
            after,
            projected: self.config.enforce_projection,
            projection_iterations,
            f_sum_area,
            subtracted: offset.is_some(),
            subtraction_coefficient: shift,
            subtraction_recommended: subtracted_kk_needed(grid, &s1)?,
            gates,
            status,
        };

        Ok(GateOutcome {
            sigma1: s1,
            sigma2: s2,
            diagnostics,
        })
    }
}

/// One-shot gate on raw frequencies with default tolerances.
pub fn causality_gate(
    omega: &[f64],
    sigma1: &[f64],
    sigma2: &[f64],
    method: TransformMethod,
    use_subtracted: bool,
    enforce_projection: bool,
) -> CausalResult<GateOutcome> {
    let grid = FrequencyGrid::new(omega.to_vec())?;
    let config = GateConfig {
        method,
        use_subtracted,
        enforce_projection,
        ..Default::default()
    };
    CausalityGate::new(&grid, config)?.run(sigma1, sigma2)
}

/// Trapezoidal integral of σ1 (total spectral weight).
pub fn f_sum_integral(grid: &FrequencyGrid, sigma1: &[f64]) -> CausalResult<f64> {
    Ok(grid.integrate(sigma1)?)
}

/// True when the trailing 10% of the frequency range carries more than 20%
/// of the integrated σ1.
///
/// Always false when the total area is not positive.
pub fn subtracted_kk_needed(grid: &FrequencyGrid, sigma1: &[f64]) -> CausalResult<bool> {
    let total = grid.integrate(sigma1)?;
    if !(total > 0.0) {
        return Ok(false);
    }

    let omega = grid.as_slice();
    let cutoff = grid.omega_max() - TAIL_FRACTION * (grid.omega_max() - grid.omega_min());
    let tail: f64 = omega
        .windows(2)
        .zip(sigma1.windows(2))
        .filter(|(w, _)| w[0] >= cutoff)
        .map(|(w, s)| 0.5 * (s[0] + s[1]) * (w[1] - w[0]))
        .sum();

    Ok(tail > TAIL_WEIGHT_LIMIT * total)
}

/// Median of the trailing samples, ignoring non-finite values.
fn tail_offset(sigma1: &[f64]) -> f64 {
    let n = sigma1.len();
    let count = ((TAIL_FRACTION * n as f64).ceil() as usize).clamp(2, n);
    median(&sigma1[n - count..])
}

fn median(data: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = data.iter().filter(|x| x.is_finite()).copied().collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    let len = sorted.len();
    if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    }
}
