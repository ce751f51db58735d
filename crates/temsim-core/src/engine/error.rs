use thiserror::Error;

use super::config::ConfigError;
use crate::core::grid::GridError;
use crate::core::potential::PotentialError;
use crate::core::wave::WaveError;

/// Errors surfaced by the propagation engine.
///
/// All variants are local-precondition violations detected eagerly at the
/// boundary of each component; none are retriable.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Grid error: {source}")]
    Grid {
        #[from]
        source: GridError,
    },

    #[error("Wavefunction error: {source}")]
    Wave {
        #[from]
        source: WaveError,
    },

    #[error("Potential error: {source}")]
    Potential {
        #[from]
        source: PotentialError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: [usize; 2],
        found: [usize; 2],
    },

    #[error("Cached kernels built for {expected_ev} eV cannot be applied to a wave at {found_ev} eV")]
    EnergyMismatch { expected_ev: f64, found_ev: f64 },

    #[error(
        "Synthesis aperture admits {found} beams but the scattering matrix stores {expected}; beam sets must be identical"
    )]
    ApertureMismatch { expected: usize, found: usize },

    #[error("Scan contains no positions")]
    EmptyScan,

    #[error("Scan aborted after {completed} of {total} positions")]
    Aborted { completed: usize, total: usize },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
