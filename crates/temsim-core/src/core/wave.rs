//! The electron wavefunction: a complex field on a grid, tagged with its energy.

use super::constants::energy2wavelength;
use super::grid::Grid;
use ndarray::Array2;
use num_complex::Complex64;
use thiserror::Error;

/// Relative tolerance for comparing the energies of waves and cached kernels.
const ENERGY_TOL: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WaveError {
    #[error("Wavefunction shape {found:?} does not match grid shape {expected:?}")]
    ShapeMismatch {
        expected: [usize; 2],
        found: [usize; 2],
    },

    #[error("Wavefunction energy {found_ev} eV disagrees with {expected_ev} eV")]
    EnergyMismatch { expected_ev: f64, found_ev: f64 },
}

/// A complex-valued 2D wavefunction on a [`Grid`], mutated in place through the
/// multislice loop and discarded after detector integration.
#[derive(Debug, Clone)]
pub struct Wavefunction {
    array: Array2<Complex64>,
    grid: Grid,
    energy_ev: f64,
    propagated: f64,
}

impl Wavefunction {
    pub fn new(array: Array2<Complex64>, grid: Grid, energy_ev: f64) -> Result<Self, WaveError> {
        let found = [array.dim().0, array.dim().1];
        if found != grid.shape() {
            return Err(WaveError::ShapeMismatch {
                expected: grid.shape(),
                found,
            });
        }
        Ok(Self {
            array,
            grid,
            energy_ev,
            propagated: 0.0,
        })
    }

    /// A unit-amplitude plane wave at normal incidence.
    pub fn plane_wave(grid: Grid, energy_ev: f64) -> Self {
        let shape = grid.shape();
        Self {
            array: Array2::from_elem((shape[0], shape[1]), Complex64::new(1.0, 0.0)),
            grid,
            energy_ev,
            propagated: 0.0,
        }
    }

    pub fn array(&self) -> &Array2<Complex64> {
        &self.array
    }

    pub fn array_mut(&mut self) -> &mut Array2<Complex64> {
        &mut self.array
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn energy_ev(&self) -> f64 {
        self.energy_ev
    }

    /// Relativistic wavelength [Å].
    pub fn wavelength(&self) -> f64 {
        energy2wavelength(self.energy_ev)
    }

    /// Accumulated propagation distance [Å] along the beam axis.
    pub fn propagated(&self) -> f64 {
        self.propagated
    }

    pub(crate) fn advance(&mut self, thickness: f64) {
        self.propagated += thickness;
    }

    /// Total intensity, the sum of `|ψ|²` over the grid.
    pub fn intensity(&self) -> f64 {
        self.array.iter().map(|v| v.norm_sqr()).sum()
    }

    /// Fails if `energy_ev` disagrees with this wave's energy beyond tolerance.
    pub fn check_energy(&self, energy_ev: f64) -> Result<(), WaveError> {
        if (self.energy_ev - energy_ev).abs() > ENERGY_TOL * self.energy_ev.abs().max(1.0) {
            return Err(WaveError::EnergyMismatch {
                expected_ev: energy_ev,
                found_ev: self.energy_ev,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_wave_has_grid_intensity() {
        let grid = Grid::from_shape([10.0, 10.0], [32, 32]).unwrap();
        let wave = Wavefunction::plane_wave(grid, 80e3);
        assert!((wave.intensity() - 1024.0).abs() < 1e-9);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let grid = Grid::from_shape([10.0, 10.0], [32, 32]).unwrap();
        let array = Array2::from_elem((16, 16), Complex64::new(1.0, 0.0));
        let result = Wavefunction::new(array, grid, 80e3);
        assert!(matches!(result, Err(WaveError::ShapeMismatch { .. })));
    }

    #[test]
    fn energy_disagreement_is_rejected() {
        let grid = Grid::from_shape([10.0, 10.0], [8, 8]).unwrap();
        let wave = Wavefunction::plane_wave(grid, 80e3);
        assert!(wave.check_energy(80e3).is_ok());
        assert!(matches!(
            wave.check_energy(100e3),
            Err(WaveError::EnergyMismatch { .. })
        ));
    }
}
