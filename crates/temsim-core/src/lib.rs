//! # temsim Core Library
//!
//! A high-performance library for image and diffraction simulation in (scanning)
//! transmission electron microscopy, built around the multislice algorithm and its
//! fast scattering-matrix variant, PRISM.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`Grid`,
//!   `Wavefunction`, `PotentialStack`), relativistic electron-optics constants,
//!   and the cached 2D FFT machinery shared by every transform in the crate.
//!
//! - **[`engine`]: The Logic Core.** This layer implements the wave-propagation
//!   algorithms: transmission functions and Fresnel propagators with their caches,
//!   the multislice transmit–propagate loop, PRISM scattering-matrix construction
//!   and per-position synthesis, detector integration, and the scan orchestrator.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer. It
//!   ties the `engine` and `core` together to execute a complete simulation: build
//!   the shared immutable caches, optionally construct the PRISM basis, then scan
//!   probe positions in parallel and integrate detectors into a measurement array.

pub mod core;
pub mod engine;
pub mod workflows;
