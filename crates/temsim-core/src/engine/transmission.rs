//! Per-slice transmission functions, `t(x) = exp(iσV(x))`.

use super::error::EngineError;
use crate::core::constants::energy2sigma;
use crate::core::grid::Grid;
use crate::core::potential::PotentialStack;
use crate::core::wave::Wavefunction;
use ndarray::Array2;
use num_complex::Complex64;

/// The complex transmission function of every slice of a potential stack,
/// precomputed once per energy. Independent of the incident wave, so it is
/// cached and shared read-only across all probe positions.
#[derive(Debug)]
pub struct TransmissionSet {
    slices: Vec<Array2<Complex64>>,
    thicknesses: Vec<f64>,
    grid: Grid,
    energy_ev: f64,
}

impl TransmissionSet {
    pub fn build(potential: &PotentialStack, energy_ev: f64) -> Self {
        let sigma = energy2sigma(energy_ev);
        let slices = potential
            .iter()
            .map(|(slice, _)| slice.mapv(|v| Complex64::cis(sigma * v)))
            .collect();
        Self {
            slices,
            thicknesses: potential.thicknesses().to_vec(),
            grid: *potential.grid(),
            energy_ev,
        }
    }

    pub fn num_slices(&self) -> usize {
        self.slices.len()
    }

    pub fn thickness(&self, index: usize) -> f64 {
        self.thicknesses[index]
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn energy_ev(&self) -> f64 {
        self.energy_ev
    }

    pub fn slice(&self, index: usize) -> &Array2<Complex64> {
        &self.slices[index]
    }

    /// Transmits the wave through slice `index`: an elementwise complex
    /// multiplication in real space.
    pub fn apply(&self, index: usize, wave: &mut Wavefunction) -> Result<(), EngineError> {
        wave.check_energy(self.energy_ev)
            .map_err(|_| EngineError::EnergyMismatch {
                expected_ev: self.energy_ev,
                found_ev: wave.energy_ev(),
            })?;
        let slice = &self.slices[index];
        let found = [wave.array().dim().0, wave.array().dim().1];
        let expected = [slice.dim().0, slice.dim().1];
        if found != expected {
            return Err(EngineError::ShapeMismatch {
                context: "transmission",
                expected,
                found,
            });
        }
        *wave.array_mut() *= slice;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::from_shape([6.4, 6.4], [32, 32]).unwrap()
    }

    #[test]
    fn constant_potential_gives_uniform_phase() {
        let g = grid();
        let value = 25.0;
        let stack = PotentialStack::with_uniform_thickness(
            vec![Array2::from_elem((32, 32), value)],
            2.0,
            g,
        )
        .unwrap();
        let set = TransmissionSet::build(&stack, 80e3);
        let expected = Complex64::cis(energy2sigma(80e3) * value);
        for v in set.slice(0).iter() {
            assert!((v - expected).norm() < 1e-14);
        }
    }

    #[test]
    fn transmission_is_unimodular() {
        let g = grid();
        let slice = Array2::from_shape_fn((32, 32), |(i, j)| (i * 7 + j) as f64 * 0.13);
        let stack = PotentialStack::with_uniform_thickness(vec![slice], 2.0, g).unwrap();
        let set = TransmissionSet::build(&stack, 80e3);
        for v in set.slice(0).iter() {
            assert!((v.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_potential_leaves_wave_unchanged() {
        let g = grid();
        let stack =
            PotentialStack::with_uniform_thickness(vec![Array2::zeros((32, 32))], 2.0, g).unwrap();
        let set = TransmissionSet::build(&stack, 80e3);
        let mut wave = Wavefunction::plane_wave(g, 80e3);
        let before = wave.array().clone();
        set.apply(0, &mut wave).unwrap();
        for (a, b) in wave.array().iter().zip(before.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let g = grid();
        let stack =
            PotentialStack::with_uniform_thickness(vec![Array2::zeros((32, 32))], 2.0, g).unwrap();
        let set = TransmissionSet::build(&stack, 80e3);
        let small = Grid::from_shape([3.2, 3.2], [16, 16]).unwrap();
        let mut wave = Wavefunction::plane_wave(small, 80e3);
        let result = set.apply(0, &mut wave);
        assert!(matches!(result, Err(EngineError::ShapeMismatch { .. })));
    }
}
