//! # Core Module
//!
//! Fundamental building blocks for electron-wave simulation: the shared sampling
//! grid, the wavefunction and potential data models, the probe-forming aperture,
//! relativistic electron-optics constants, and cached 2D FFT plans.
//!
//! Everything in this layer is stateless or immutable after construction; the
//! stateful propagation logic lives in [`crate::engine`].

pub mod aperture;
pub mod constants;
pub mod fft;
pub mod grid;
pub mod potential;
pub mod wave;
