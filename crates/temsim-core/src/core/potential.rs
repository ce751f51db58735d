//! The sliced electrostatic potential consumed read-only by the engine.
//!
//! How the projected potentials are computed (atomic form factors, DFT grids,
//! ...) is the supplying collaborator's concern; the core only requires slices
//! ordered along the beam axis on a common grid.

use super::grid::Grid;
use ndarray::Array2;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PotentialError {
    #[error("Potential stack has no slices")]
    Empty,

    #[error("Slice {index} has shape {found:?}, expected grid shape {expected:?}")]
    SliceShape {
        index: usize,
        expected: [usize; 2],
        found: [usize; 2],
    },

    #[error("{slices} slices but {thicknesses} thickness entries")]
    LengthMismatch { slices: usize, thicknesses: usize },

    #[error("Slice {index} has non-positive thickness {thickness}")]
    InvalidThickness { index: usize, thickness: f64 },
}

/// An ordered stack of projected-potential slices [V·Å] with per-slice
/// thicknesses [Å], all sharing one [`Grid`].
#[derive(Debug, Clone)]
pub struct PotentialStack {
    slices: Vec<Array2<f64>>,
    thicknesses: Vec<f64>,
    grid: Grid,
}

impl PotentialStack {
    pub fn new(
        slices: Vec<Array2<f64>>,
        thicknesses: Vec<f64>,
        grid: Grid,
    ) -> Result<Self, PotentialError> {
        if slices.is_empty() {
            return Err(PotentialError::Empty);
        }
        if slices.len() != thicknesses.len() {
            return Err(PotentialError::LengthMismatch {
                slices: slices.len(),
                thicknesses: thicknesses.len(),
            });
        }
        for (index, slice) in slices.iter().enumerate() {
            let found = [slice.dim().0, slice.dim().1];
            if found != grid.shape() {
                return Err(PotentialError::SliceShape {
                    index,
                    expected: grid.shape(),
                    found,
                });
            }
        }
        for (index, &thickness) in thicknesses.iter().enumerate() {
            if thickness <= 0.0 {
                return Err(PotentialError::InvalidThickness { index, thickness });
            }
        }
        Ok(Self {
            slices,
            thicknesses,
            grid,
        })
    }

    /// Convenience constructor for a stack with one common slice thickness.
    pub fn with_uniform_thickness(
        slices: Vec<Array2<f64>>,
        thickness: f64,
        grid: Grid,
    ) -> Result<Self, PotentialError> {
        let thicknesses = vec![thickness; slices.len()];
        Self::new(slices, thicknesses, grid)
    }

    pub fn num_slices(&self) -> usize {
        self.slices.len()
    }

    pub fn slice(&self, index: usize) -> &Array2<f64> {
        &self.slices[index]
    }

    pub fn thickness(&self, index: usize) -> f64 {
        self.thicknesses[index]
    }

    pub fn thicknesses(&self) -> &[f64] {
        &self.thicknesses
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Total thickness [Å] of the stack along the beam axis.
    pub fn total_thickness(&self) -> f64 {
        self.thicknesses.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Array2<f64>, f64)> {
        self.slices
            .iter()
            .zip(self.thicknesses.iter().copied())
    }
}
