//! Fresnel free-space propagation in Fourier space.

use super::error::EngineError;
use crate::core::constants::energy2wavelength;
use crate::core::fft::FftPlan2;
use crate::core::grid::Grid;
use crate::core::wave::Wavefunction;
use ndarray::Array2;
use num_complex::Complex64;
use std::collections::HashMap;
use std::f64::consts::PI;

/// The paraxial Fresnel propagator kernel for one slice thickness,
/// `P(k) = exp(-iπλt|k|²)`, with the anti-aliasing mask applied.
#[derive(Debug, Clone)]
pub struct Propagator {
    kernel: Array2<Complex64>,
    thickness: f64,
    energy_ev: f64,
}

impl Propagator {
    pub fn build(grid: &Grid, energy_ev: f64, thickness: f64) -> Self {
        let wavelength = energy2wavelength(energy_ev);
        let [kx, ky] = grid.spatial_frequencies();
        let mask = grid.antialias_mask();
        let shape = grid.shape();
        let kernel = Array2::from_shape_fn((shape[0], shape[1]), |(i, j)| {
            if mask[[i, j]] {
                let k_sq = kx[i] * kx[i] + ky[j] * ky[j];
                Complex64::cis(-PI * wavelength * thickness * k_sq)
            } else {
                Complex64::ZERO
            }
        });
        Self {
            kernel,
            thickness,
            energy_ev,
        }
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn kernel(&self) -> &Array2<Complex64> {
        &self.kernel
    }

    /// Propagates the wave over this kernel's thickness: forward transform,
    /// elementwise multiply, inverse transform.
    pub fn apply(&self, wave: &mut Wavefunction, fft: &FftPlan2) -> Result<(), EngineError> {
        wave.check_energy(self.energy_ev)
            .map_err(|_| EngineError::EnergyMismatch {
                expected_ev: self.energy_ev,
                found_ev: wave.energy_ev(),
            })?;
        let found = [wave.array().dim().0, wave.array().dim().1];
        let expected = [self.kernel.dim().0, self.kernel.dim().1];
        if found != expected {
            return Err(EngineError::ShapeMismatch {
                context: "propagator",
                expected,
                found,
            });
        }
        fft.forward_inplace(wave.array_mut());
        *wave.array_mut() *= &self.kernel;
        fft.inverse_inplace(wave.array_mut());
        wave.advance(self.thickness);
        Ok(())
    }
}

/// Propagator kernels for every distinct slice thickness of a potential stack,
/// built once per energy and shared read-only across scan workers.
#[derive(Debug)]
pub struct PropagatorSet {
    kernels: HashMap<u64, Propagator>,
    energy_ev: f64,
}

impl PropagatorSet {
    pub fn build(grid: &Grid, energy_ev: f64, thicknesses: &[f64]) -> Self {
        let mut kernels = HashMap::new();
        for &thickness in thicknesses {
            kernels
                .entry(thickness.to_bits())
                .or_insert_with(|| Propagator::build(grid, energy_ev, thickness));
        }
        Self { kernels, energy_ev }
    }

    pub fn energy_ev(&self) -> f64 {
        self.energy_ev
    }

    pub fn num_kernels(&self) -> usize {
        self.kernels.len()
    }

    pub fn get(&self, thickness: f64) -> Result<&Propagator, EngineError> {
        self.kernels.get(&thickness.to_bits()).ok_or_else(|| {
            EngineError::Internal(format!(
                "no propagator cached for slice thickness {thickness}"
            ))
        })
    }
}
