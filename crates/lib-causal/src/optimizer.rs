//! Entropy-regularized free-energy minimization under the causality
//! constraint.
//!
//! The functional is
//!
//! ```text
//! F[π] = ∫ ε(ω)·π(ω) dω − Θ·S[π],     S[π] = −∫ π·ln π dω
//! ```
//!
//! over unit-area densities π ≥ 0. Without the causality constraint the
//! minimizer is the Gibbs density π ∝ exp(−ε/Θ). The optimizer separates
//! three concerns:
//!
//! 1. a [`TargetDensity`] computes the unconstrained target (pure),
//! 2. the [`KkProjector`] enforces causality (pure),
//! 3. [`ConstrainedOptimizer::minimize_with`] iterates the two to a fixed point.
//!
//! With the canonical [`GibbsPrior`] the target does not depend on the
//! current density, so the loop settles after two iterations. A
//! self-consistent variant, where ε or Θ depend on π, only needs a different
//! `TargetDensity` implementation.
//!
//! A run counts as converged only when the outer loop settles and the last
//! causal projection met its own tolerance.
//!
//! For the canonical kernel on a wide grid the Gibbs density gives
//! E = Θ and S = 1 + ln(Θ/ħ), so the ratio E*/S* reported by
//! [`OptimizationResult::theta_estimate`] is Θ/(1 + ln Θ) with ħ = 1. It
//! recovers Θ itself only at Θ = ħ and is undefined at Θ = ħ/e, where the
//! entropy of a density normalized in ω crosses zero.

use crate::error::{CausalError, CausalResult};
use crate::projector::{KkProjector, ProjectorConfig};
use lib_dsp::{relative_error, TransformMethod};
use lib_types::{FrequencyGrid, OptimizationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Floor applied to π before taking its logarithm.
pub const DENSITY_FLOOR: f64 = 1e-16;

/// Energy assigned to each frequency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyKernel {
    /// ε(ω) = ħ·ω.
    #[default]
    Canonical,
}

impl EnergyKernel {
    /// Energies on a grid.
    pub fn energies(self, grid: &FrequencyGrid, hbar: f64) -> Vec<f64> {
        match self {
            Self::Canonical => grid.as_slice().iter().map(|w| hbar * w).collect(),
        }
    }
}

impl fmt::Display for EnergyKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canonical => write!(f, "canonical"),
        }
    }
}

impl FromStr for EnergyKernel {
    type Err = CausalError;

    /// Only `"canonical"` is implemented; any other name is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "canonical" => Ok(Self::Canonical),
            other => Err(CausalError::NotImplemented(format!(
                "energy kernel '{}' (only 'canonical' is available)",
                other
            ))),
        }
    }
}

/// Source of the unconstrained target density for each outer iteration.
pub trait TargetDensity {
    /// Unnormalized target on `grid`. `current` is the latest density, or
    /// `None` when seeding the iteration.
    fn density(&self, grid: &FrequencyGrid, current: Option<&[f64]>) -> Vec<f64>;
}

/// Gibbs density exp(−ε/Θ) for fixed energies and temperature.
#[derive(Clone, Debug, PartialEq)]
pub struct GibbsPrior {
    energies: Vec<f64>,
    theta: f64,
}

impl GibbsPrior {
    pub fn new(energies: Vec<f64>, theta: f64) -> Self {
        Self { energies, theta }
    }

    /// Unnormalized Gibbs weights, shifted by the minimum energy to keep the
    /// exponent ≤ 0.
    pub fn weights(&self) -> Vec<f64> {
        let e_min = self.energies.iter().copied().fold(f64::INFINITY, f64::min);
        self.energies
            .iter()
            .map(|e| (-(e - e_min) / self.theta).exp())
            .collect()
    }
}

impl TargetDensity for GibbsPrior {
    fn density(&self, _grid: &FrequencyGrid, _current: Option<&[f64]>) -> Vec<f64> {
        self.weights()
    }
}

/// Settings for [`ConstrainedOptimizer::from_config`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Energy kernel name; only `"canonical"` is implemented.
    #[serde(default = "default_kernel")]
    pub kernel: String,

    /// Information temperature Θ > 0.
    pub theta: f64,

    /// Energy scale of the canonical kernel.
    #[serde(default = "default_hbar")]
    pub hbar: f64,

    /// Outer iteration cap.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Convergence tolerance on the relative change of F and of π.
    #[serde(default = "default_tol")]
    pub tol: f64,

    /// Hilbert strategy of the projector.
    #[serde(default)]
    pub method: TransformMethod,

    #[serde(default)]
    pub projector: ProjectorConfig,
}

fn default_kernel() -> String { "canonical".to_string() }
fn default_hbar() -> f64 { 1.0 }
fn default_max_iter() -> usize { 80 }
fn default_tol() -> f64 { 5e-6 }

impl OptimizerConfig {
    /// Defaults for a given temperature.
    pub fn with_theta(theta: f64) -> Self {
        Self {
            kernel: default_kernel(),
            theta,
            hbar: default_hbar(),
            max_iter: default_max_iter(),
            tol: default_tol(),
            method: TransformMethod::default(),
            projector: ProjectorConfig::default(),
        }
    }
}

/// Causality-constrained free-energy minimizer.
#[derive(Debug)]
pub struct ConstrainedOptimizer {
    kernel: EnergyKernel,
    energies: Vec<f64>,
    theta: f64,
    projector: KkProjector,
}

impl ConstrainedOptimizer {
    /// Create an optimizer.
    ///
    /// # Arguments
    ///
    /// * `kernel` - Energy kernel name; only `"canonical"` (ε = ħω, ħ = 1)
    /// * `theta` - Information temperature, strictly positive
    /// * `projector` - Causal projector; its grid defines the optimizer's grid
    ///
    /// # Errors
    ///
    /// [`CausalError::NotImplemented`] for any kernel other than canonical,
    /// [`CausalError::InvalidConfig`] for a non-positive Θ.
    pub fn new(kernel: &str, theta: f64, projector: KkProjector) -> CausalResult<Self> {
        Self::with_hbar(kernel, theta, 1.0, projector)
    }

    /// Like [`ConstrainedOptimizer::new`] with an explicit energy scale.
    pub fn with_hbar(kernel: &str, theta: f64, hbar: f64, projector: KkProjector) -> CausalResult<Self> {
        let kernel: EnergyKernel = kernel.parse()?;

        if !(theta > 0.0 && theta.is_finite()) {
            return Err(CausalError::InvalidConfig(format!(
                "theta must be positive and finite, got {}",
                theta
            )));
        }
        if !(hbar > 0.0 && hbar.is_finite()) {
            return Err(CausalError::InvalidConfig(format!(
                "hbar must be positive and finite, got {}",
                hbar
            )));
        }

        let energies = kernel.energies(projector.grid(), hbar);
        Ok(Self {
            kernel,
            energies,
            theta,
            projector,
        })
    }

    /// Build the projector and optimizer from a configuration.
    pub fn from_config(grid: &FrequencyGrid, config: &OptimizerConfig) -> CausalResult<Self> {
        let projector = KkProjector::with_config(grid, config.method, config.projector.clone())?;
        Self::with_hbar(&config.kernel, config.theta, config.hbar, projector)
    }

    pub fn kernel(&self) -> EnergyKernel {
        self.kernel
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn projector(&self) -> &KkProjector {
        &self.projector
    }

    pub fn grid(&self) -> &FrequencyGrid {
        self.projector.grid()
    }

    /// Canonical Gibbs prior for this optimizer's energies and Θ.
    pub fn gibbs_prior(&self) -> GibbsPrior {
        GibbsPrior::new(self.energies.clone(), self.theta)
    }

    /// E[π] = ∫ε·π dω.
    pub fn mean_energy(&self, pi: &[f64]) -> CausalResult<f64> {
        self.grid().check_len(pi.len())?;
        let weighted: Vec<f64> = self.energies.iter().zip(pi).map(|(e, p)| e * p).collect();
        Ok(self.grid().integrate(&weighted)?)
    }

    /// S[π] = −∫π·ln π dω, with π floored at [`DENSITY_FLOOR`] inside the log.
    pub fn entropy(&self, pi: &[f64]) -> CausalResult<f64> {
        let integrand: Vec<f64> = pi.iter().map(|&p| -p * p.max(DENSITY_FLOOR).ln()).collect();
        Ok(self.grid().integrate(&integrand)?)
    }

    /// F[π] = E[π] − Θ·S[π].
    pub fn free_energy(&self, pi: &[f64]) -> CausalResult<f64> {
        Ok(self.mean_energy(pi)? - self.theta * self.entropy(pi)?)
    }

    /// Minimize with the canonical Gibbs target.
    pub fn minimize(&self, max_iter: usize, tol: f64) -> CausalResult<OptimizationResult> {
        self.minimize_with(&self.gibbs_prior(), max_iter, tol)
    }

    /// Fixed-point iteration of target density and causal projection.
    ///
    /// Each iteration recomputes the target from the latest density,
    /// projects it, and records F and the violation of the projected density.
    /// Convergence requires both the relative change of F and of π to fall
    /// below `tol`. Running out of iterations is not an error: the last
    /// density is returned with `converged = false` and a warning is logged.
    pub fn minimize_with<T: TargetDensity + ?Sized>(
        &self,
        target: &T,
        max_iter: usize,
        tol: f64,
    ) -> CausalResult<OptimizationResult> {
        if max_iter == 0 {
            return Err(CausalError::InvalidConfig(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if !(tol >= 0.0 && tol.is_finite()) {
            return Err(CausalError::InvalidConfig(format!(
                "tol must be finite and non-negative, got {}",
                tol
            )));
        }

        let grid = self.grid();
        let mut pi = self.projector.normalize(&target.density(grid, None))?;
        let mut free_energy = self.free_energy(&pi)?;

        let mut free_energy_history = Vec::with_capacity(max_iter);
        let mut violation_history = Vec::with_capacity(max_iter);
        let mut iterations = 0;
        let mut converged = false;
        let mut projection_converged = false;

        for iteration in 1..=max_iter {
            let prior = self.projector.normalize(&target.density(grid, Some(&pi)))?;
            let projection = self.projector.project(&prior)?;
            projection_converged = projection.converged;
            if !projection.converged {
                tracing::debug!(
                    iteration,
                    projection_iterations = projection.iterations,
                    last_update = projection.last_update,
                    "causal projection stopped above its tolerance"
                );
            }
            let projected = projection.density;

            let next_free_energy = self.free_energy(&projected)?;
            let violation = self.projector.violation(&projected)?;
            free_energy_history.push(next_free_energy);
            violation_history.push(violation);

            let df = (next_free_energy - free_energy).abs() / free_energy.abs().max(f64::EPSILON);
            let dpi = relative_error(&projected, &pi);

            tracing::debug!(iteration, free_energy = next_free_energy, violation, df, dpi, "optimizer step");

            pi = projected;
            free_energy = next_free_energy;
            iterations = iteration;

            if df < tol && dpi < tol {
                converged = projection_converged;
                break;
            }
        }

        let final_violation = violation_history.last().copied().unwrap_or(f64::NAN);

        if converged {
            tracing::info!(iterations, free_energy, final_violation, "optimizer converged");
        } else if iterations < max_iter {
            tracing::warn!(
                iterations,
                final_violation,
                projector_tol = self.projector.config().tol,
                "optimizer reached a fixed point but the causal projection did not converge"
            );
        } else {
            tracing::warn!(
                iterations,
                tol,
                final_violation,
                "optimizer did not converge, returning best-effort density"
            );
        }

        Ok(OptimizationResult {
            mean_energy: self.mean_energy(&pi)?,
            entropy: self.entropy(&pi)?,
            density: pi,
            free_energy,
            iterations,
            converged,
            free_energy_history,
            violation_history,
            final_violation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimizer(theta: f64) -> ConstrainedOptimizer {
        let grid = FrequencyGrid::linspace(0.01, 10.0, 512).unwrap();
        let projector = KkProjector::new(&grid, TransformMethod::OddFft).unwrap();
        ConstrainedOptimizer::new("canonical", theta, projector).unwrap()
    }

    #[test]
    fn test_unknown_kernel_not_implemented() {
        let grid = FrequencyGrid::linspace(0.01, 10.0, 64).unwrap();
        let projector = KkProjector::new(&grid, TransformMethod::OddFft).unwrap();
        let result = ConstrainedOptimizer::new("debye", 1.0, projector);
        assert!(matches!(result, Err(CausalError::NotImplemented(_))));

        assert!(matches!(
            "quantum".parse::<EnergyKernel>(),
            Err(CausalError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_non_positive_theta_rejected() {
        let grid = FrequencyGrid::linspace(0.01, 10.0, 64).unwrap();
        for theta in [0.0, -1.0, f64::NAN] {
            let projector = KkProjector::new(&grid, TransformMethod::OddFft).unwrap();
            assert!(matches!(
                ConstrainedOptimizer::new("canonical", theta, projector),
                Err(CausalError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_minimize_converges_and_recovers_theta() {
        let opt = optimizer(1.0);
        let result = opt.minimize(80, 5e-6).unwrap();

        assert!(result.converged, "no convergence after {} iterations", result.iterations);
        assert!(result.final_violation < 0.06, "final violation {:.4}", result.final_violation);

        let theta_est = result.theta_estimate();
        assert!(
            (theta_est - 1.0).abs() < 0.15,
            "theta estimate {:.4}",
            theta_est
        );

        assert_eq!(result.free_energy_history.len(), result.iterations);
        assert_eq!(result.violation_history.len(), result.iterations);
        let area = opt.grid().integrate(&result.density).unwrap();
        assert!((area - 1.0).abs() < 1e-10);
    }

    fn gibbs_ratio(theta: f64) -> f64 {
        theta / (1.0 + theta.ln())
    }

    #[test]
    fn test_low_temperature_energy_entropy_ratio() {
        let result = optimizer(0.5).minimize(80, 5e-6).unwrap();

        assert!(result.converged, "no convergence after {} iterations", result.iterations);
        assert!(result.final_violation < 0.06, "final violation {:.4}", result.final_violation);

        let theta_est = result.theta_estimate();
        let expected = gibbs_ratio(0.5);
        assert!(
            ((theta_est - expected) / expected).abs() < 0.1,
            "E/S {:.4}, expected about {:.4}",
            theta_est,
            expected
        );
    }

    #[test]
    fn test_unconverged_projection_is_reported() {
        // At Θ = 2 the KK round trip of the Gibbs density plateaus just above
        // the projector tolerance
        let result = optimizer(2.0).minimize(80, 5e-6).unwrap();

        assert!(!result.converged, "converged despite an unconverged projection");
        assert!(result.iterations < 80, "outer loop ran to the cap");
        assert!(result.final_violation < 0.06, "final violation {:.4}", result.final_violation);

        let theta_est = result.theta_estimate();
        let expected = gibbs_ratio(2.0);
        assert!(
            ((theta_est - expected) / expected).abs() < 0.1,
            "E/S {:.4}, expected about {:.4}",
            theta_est,
            expected
        );
    }

    #[test]
    fn test_converged_projection_is_reported() {
        let grid = FrequencyGrid::linspace(0.01, 10.0, 512).unwrap();
        let config = ProjectorConfig {
            tol: 0.05,
            ..Default::default()
        };
        let projector = KkProjector::with_config(&grid, TransformMethod::OddFft, config).unwrap();
        let opt = ConstrainedOptimizer::new("canonical", 2.0, projector).unwrap();

        let result = opt.minimize(80, 5e-6).unwrap();
        assert!(result.converged, "no convergence after {} iterations", result.iterations);
    }

    #[test]
    fn test_non_convergence_is_not_an_error() {
        let opt = optimizer(1.0);
        let result = opt.minimize(1, 5e-6).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert!(result.final_violation.is_finite());
    }

    #[test]
    fn test_free_energy_of_gibbs_density() {
        // For π = e^{-ω} on [0, ∞): E = 1, S = 1, so F = 0 at Θ = 1
        let opt = optimizer(1.0);
        let pi = opt.projector().normalize(&opt.gibbs_prior().weights()).unwrap();
        let e = opt.mean_energy(&pi).unwrap();
        let s = opt.entropy(&pi).unwrap();
        assert!((e - 1.0).abs() < 0.03, "E = {:.4}", e);
        assert!((s - 1.0).abs() < 0.03, "S = {:.4}", s);
        assert!(opt.free_energy(&pi).unwrap().abs() < 0.05);
    }

    #[test]
    fn test_entropy_floor_handles_zeros() {
        let opt = optimizer(1.0);
        let mut pi = vec![0.0; opt.grid().len()];
        pi[10] = 1.0;
        assert!(opt.entropy(&pi).unwrap().is_finite());
    }

    struct Uniform;

    impl TargetDensity for Uniform {
        fn density(&self, grid: &FrequencyGrid, _current: Option<&[f64]>) -> Vec<f64> {
            vec![1.0; grid.len()]
        }
    }

    #[test]
    fn test_custom_target_is_used() {
        let opt = optimizer(1.0);
        let gibbs = opt.minimize(10, 5e-6).unwrap();
        let flat = opt.minimize_with(&Uniform, 10, 5e-6).unwrap();
        // A flat target carries far more energy than the Gibbs one
        assert!(flat.mean_energy > 2.0 * gibbs.mean_energy);
    }
}
