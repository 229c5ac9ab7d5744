//! Causality-constrained spectral inference.
//!
//! This crate builds on the transforms in `lib-dsp`:
//!
//! - [`projector`]: iterative projection of densities onto the causal subspace
//! - [`optimizer`]: entropy-regularized free-energy minimization under the
//!   causality constraint
//! - [`gate`]: pass/fail validation of σ1/σ2 pairs against the KK relations
//!   and the f-sum rule

pub mod error;
pub mod gate;
pub mod optimizer;
pub mod projector;

pub use error::{CausalError, CausalResult};
pub use gate::{causality_gate, f_sum_integral, subtracted_kk_needed, CausalityGate, GateConfig, GateOutcome};
pub use optimizer::{ConstrainedOptimizer, EnergyKernel, GibbsPrior, OptimizerConfig, TargetDensity};
pub use projector::{normalize_density, KkProjector, Projection, ProjectorConfig};
