//! # lib-types
//!
//! Core type definitions for the causal spectral kernel.
//!
//! This crate provides the data model shared by the workspace:
//! - Validated frequency grids (strictly positive, strictly increasing)
//! - Spectral functions bound to a grid
//! - Result records for consistency checks, optimization and gating

pub mod error;
pub mod grid;
pub mod results;
pub mod spectral;

pub use error::GridError;
pub use grid::FrequencyGrid;
pub use results::*;
pub use spectral::SpectralFunction;
