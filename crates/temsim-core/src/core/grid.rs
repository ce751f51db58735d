//! Real-space / Fourier-space sampling grid shared by every array in a simulation.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relative tolerance for `shape == round(extent / sampling)` consistency checks.
const CONSISTENCY_TOL: f64 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("Invalid grid specification: {reason}")]
    Invalid { reason: String },

    #[error(
        "Inconsistent grids: extent {expected_extent:?} / shape {expected_shape:?} vs extent {found_extent:?} / shape {found_shape:?}"
    )]
    Mismatch {
        expected_extent: [f64; 2],
        expected_shape: [usize; 2],
        found_extent: [f64; 2],
        found_shape: [usize; 2],
    },
}

/// Immutable descriptor of the sampling common to all real- and Fourier-space
/// arrays in one simulation.
///
/// The invariant `shape == round(extent / sampling)` holds by construction;
/// when built from an extent and a requested sampling, the shape is rounded up
/// and the sampling re-derived so that `extent == shape * sampling` is exact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    extent: [f64; 2],
    sampling: [f64; 2],
    shape: [usize; 2],
}

impl Grid {
    /// Builds a grid from a physical extent [Å] and a requested sampling [Å].
    pub fn new(extent: [f64; 2], sampling: [f64; 2]) -> Result<Self, GridError> {
        Self::with_spec(extent, Some(sampling), None)
    }

    /// Builds a grid from a physical extent [Å] and pixel counts.
    pub fn from_shape(extent: [f64; 2], shape: [usize; 2]) -> Result<Self, GridError> {
        Self::with_spec(extent, None, Some(shape))
    }

    /// Builds a grid from an extent plus whichever of sampling and shape the
    /// caller knows. Fails if neither is given, or if both are given but
    /// disagree beyond floating tolerance.
    pub fn with_spec(
        extent: [f64; 2],
        sampling: Option<[f64; 2]>,
        shape: Option<[usize; 2]>,
    ) -> Result<Self, GridError> {
        if extent[0] <= 0.0 || extent[1] <= 0.0 {
            return Err(GridError::Invalid {
                reason: format!("extent must be positive, got {:?}", extent),
            });
        }

        let shape = match (sampling, shape) {
            (None, None) => {
                return Err(GridError::Invalid {
                    reason: "neither sampling nor shape specified".to_string(),
                });
            }
            (Some(s), None) => {
                if s[0] <= 0.0 || s[1] <= 0.0 {
                    return Err(GridError::Invalid {
                        reason: format!("sampling must be positive, got {:?}", s),
                    });
                }
                [
                    (extent[0] / s[0]).ceil() as usize,
                    (extent[1] / s[1]).ceil() as usize,
                ]
            }
            (None, Some(n)) => n,
            (Some(s), Some(n)) => {
                for axis in 0..2 {
                    let implied = (extent[axis] / s[axis]).round();
                    if (implied - n[axis] as f64).abs() > CONSISTENCY_TOL * implied.max(1.0) {
                        return Err(GridError::Invalid {
                            reason: format!(
                                "sampling {:?} and shape {:?} disagree for extent {:?}",
                                s, n, extent
                            ),
                        });
                    }
                }
                n
            }
        };

        if shape[0] == 0 || shape[1] == 0 {
            return Err(GridError::Invalid {
                reason: format!("shape must be nonzero, got {:?}", shape),
            });
        }

        let sampling = [extent[0] / shape[0] as f64, extent[1] / shape[1] as f64];
        Ok(Self {
            extent,
            sampling,
            shape,
        })
    }

    pub fn extent(&self) -> [f64; 2] {
        self.extent
    }

    pub fn sampling(&self) -> [f64; 2] {
        self.sampling
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn num_pixels(&self) -> usize {
        self.shape[0] * self.shape[1]
    }

    /// Spatial frequencies [1/Å] per axis, in standard FFT order.
    pub fn spatial_frequencies(&self) -> [Vec<f64>; 2] {
        [
            fftfreq(self.shape[0], self.sampling[0]),
            fftfreq(self.shape[1], self.sampling[1]),
        ]
    }

    /// Radial frequency cutoff [1/Å] at 2/3 of the smaller Nyquist limit,
    /// preventing wrap-around aliasing in repeated real-space multiplications.
    pub fn antialias_cutoff(&self) -> f64 {
        let nyquist = (0.5 / self.sampling[0]).min(0.5 / self.sampling[1]);
        2.0 / 3.0 * nyquist
    }

    /// Boolean mask over the Fourier grid admitting frequencies inside the
    /// anti-aliasing cutoff.
    pub fn antialias_mask(&self) -> Array2<bool> {
        let [kx, ky] = self.spatial_frequencies();
        let cutoff_sq = self.antialias_cutoff().powi(2);
        Array2::from_shape_fn(
            (self.shape[0], self.shape[1]),
            |(i, j)| kx[i] * kx[i] + ky[j] * ky[j] <= cutoff_sq,
        )
    }

    /// Fails if `other` describes a different sampling than this grid.
    pub fn check_match(&self, other: &Grid) -> Result<(), GridError> {
        let extent_ok = (0..2).all(|axis| {
            (self.extent[axis] - other.extent[axis]).abs()
                <= CONSISTENCY_TOL * self.extent[axis].abs().max(1.0)
        });
        if self.shape != other.shape || !extent_ok {
            return Err(GridError::Mismatch {
                expected_extent: self.extent,
                expected_shape: self.shape,
                found_extent: other.extent,
                found_shape: other.shape,
            });
        }
        Ok(())
    }
}

/// Discrete Fourier transform sample frequencies, `numpy.fft.fftfreq` order.
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let f = if i < n.div_ceil(2) {
                i as f64
            } else {
                i as f64 - n as f64
            };
            f / (n as f64 * d)
        })
        .collect()
}
