//! # Engine Module
//!
//! The wave-propagation engine: cached transmission functions and Fresnel
//! propagators, the multislice loop, the PRISM scattering matrix, detector
//! integration, and the parallel scan orchestrator.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Scan mode, aperture and energy parameters
//! - **Caches** ([`transmission`], [`propagator`]) - Shared immutable kernels,
//!   built once per energy and published read-only to all scan workers
//! - **Propagation** ([`multislice`], [`prism`], [`probe`]) - Exit-wave
//!   computation, either one multislice pass per position or basis synthesis
//! - **Reduction** ([`detector`], [`scan`]) - Measurement integration and
//!   position-indexed output assembly
//! - **Progress Monitoring** ([`progress`]) - Progress reporting callbacks
//! - **Error Handling** ([`error`]) - Engine-specific error taxonomy

pub mod config;
pub mod detector;
pub mod error;
pub mod multislice;
pub mod prism;
pub mod probe;
pub mod progress;
pub mod propagator;
pub mod scan;
pub mod transmission;
