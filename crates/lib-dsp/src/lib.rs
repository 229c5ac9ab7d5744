//! # lib-dsp
//!
//! Numerical core of the causal spectral kernel.
//!
//! This crate provides the transforms everything else is built on:
//!
//! - **Hilbert transforms**: five discrete strategies behind one dispatch
//!   (dense kernel, principal-value quadrature, plain FFT, odd-extension FFT,
//!   resampled odd-extension FFT)
//! - **Kramers-Kronig relations**: forward/backward transforms between the
//!   real and imaginary parts of a causal response, with a UV tail model
//! - **Support**: cached real-FFT plans, edge tapers, linear resampling

pub mod error;
pub mod fft;
pub mod hilbert;
pub mod interpolation;
pub mod kramers_kronig;
pub mod window;

pub use error::{DspError, DspResult};
pub use hilbert::{relative_error, HilbertConfig, HilbertTransform, Parity, TransformMethod};
pub use kramers_kronig::{KkConfig, KramersKronig};
pub use window::WindowType;
