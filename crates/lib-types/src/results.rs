//! Result records returned by the analysis engine.
//!
//! These are plain data: created fresh per call, owned by the caller, and
//! serializable so they can be written to audit logs without conversion.

use serde::{Deserialize, Serialize};

/// Outcome of a Kramers-Kronig consistency check.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Both reconstruction errors are below the tolerance.
    pub consistent: bool,
    /// ‖forward(σ1) − σ2‖ / ‖σ2‖.
    pub forward_error: f64,
    /// ‖backward(σ2) − σ1‖ / ‖σ1‖.
    pub backward_error: f64,
    /// Tolerance the verdict was taken against.
    pub tol: f64,
}

impl ConsistencyReport {
    pub fn new(forward_error: f64, backward_error: f64, tol: f64) -> Self {
        // NaN errors compare false and therefore never count as consistent
        let consistent = forward_error < tol && backward_error < tol;
        Self {
            consistent,
            forward_error,
            backward_error,
            tol,
        }
    }

    /// Larger of the two reconstruction errors.
    pub fn max_error(&self) -> f64 {
        self.forward_error.max(self.backward_error)
    }
}

/// Result of a constrained free-energy minimization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Optimal density π*.
    pub density: Vec<f64>,
    /// Free energy F* = E* − Θ·S*.
    pub free_energy: f64,
    /// Mean energy E* = ∫ε·π* dω.
    pub mean_energy: f64,
    /// Entropy S* = −∫π*·ln π* dω.
    pub entropy: f64,
    /// Number of outer iterations performed.
    pub iterations: usize,
    /// Whether both convergence criteria were met.
    pub converged: bool,
    /// Free energy after each iteration.
    pub free_energy_history: Vec<f64>,
    /// Causality violation after each iteration.
    pub violation_history: Vec<f64>,
    /// Causality violation of π*.
    pub final_violation: f64,
}

impl OptimizationResult {
    /// Information temperature recovered from the optimum, Θ_est = E*/S*.
    ///
    /// For a Gibbs optimum of the canonical kernel this is Θ/(1 + ln Θ), which
    /// equals Θ only at Θ = ħ = 1. Returns NaN when the entropy vanishes.
    pub fn theta_estimate(&self) -> f64 {
        if self.entropy == 0.0 {
            return f64::NAN;
        }
        self.mean_energy / self.entropy
    }
}

/// Overall verdict of the causality gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateStatus {
    Pass,
    Fail,
}

impl GateStatus {
    pub fn is_pass(self) -> bool {
        matches!(self, GateStatus::Pass)
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// Individual gate booleans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateChecks {
    /// KK consistency of the final (post-projection) pair.
    #[serde(rename = "KK_consistency")]
    pub kk_consistency: bool,
    /// f-sum integral is strictly positive.
    pub f_sum_positive: bool,
}

impl GateChecks {
    pub fn all_pass(&self) -> bool {
        self.kk_consistency && self.f_sum_positive
    }
}

/// Full diagnostics from one run of the causality gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateDiagnostics {
    /// Consistency of the raw input pair.
    pub before: ConsistencyReport,
    /// Consistency of the pair the verdict is based on.
    pub after: ConsistencyReport,
    /// Whether the projection step ran.
    pub projected: bool,
    /// Iterations used by the projection, zero if it did not run.
    pub projection_iterations: usize,
    /// Trapezoidal integral of the final σ1.
    pub f_sum_area: f64,
    /// Whether a UV tail offset was subtracted.
    pub subtracted: bool,
    /// Offset removed from σ1 (and restored afterwards).
    pub subtraction_coefficient: f64,
    /// Tail-weight heuristic on the final σ1.
    pub subtraction_recommended: bool,
    pub gates: GateChecks,
    pub status: GateStatus,
}
