//! Direct-mode probe construction: aperture coefficients, a Fourier-domain
//! phase ramp for sub-pixel positioning, and an inverse transform.

use super::error::EngineError;
use crate::core::aperture::Aperture;
use crate::core::fft::FftPlan2;
use crate::core::grid::Grid;
use crate::core::wave::Wavefunction;
use ndarray::Array2;
use num_complex::Complex64;
use std::f64::consts::TAU;

/// Builds unit-intensity probes at arbitrary real-space positions from a fixed
/// aperture. The aperture coefficients are computed and normalized once; each
/// position only costs a phase-ramp multiply and one inverse FFT.
#[derive(Debug)]
pub struct ProbeFactory {
    coefficients: Array2<Complex64>,
    kx: Vec<f64>,
    ky: Vec<f64>,
    grid: Grid,
    energy_ev: f64,
}

impl ProbeFactory {
    pub fn new(grid: Grid, aperture: &Aperture, energy_ev: f64) -> Result<Self, EngineError> {
        let mut coefficients = aperture.probe_coefficients(&grid, energy_ev);
        let n = grid.num_pixels() as f64;
        let norm = coefficients.iter().map(|c| c.norm_sqr()).sum::<f64>() / n;
        if norm <= 0.0 {
            return Err(EngineError::Internal(
                "aperture admits no beams on this grid".to_string(),
            ));
        }
        let scale = 1.0 / norm.sqrt();
        coefficients.mapv_inplace(|c| c * scale);

        let [kx, ky] = grid.spatial_frequencies();
        Ok(Self {
            coefficients,
            kx,
            ky,
            grid,
            energy_ev,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn energy_ev(&self) -> f64 {
        self.energy_ev
    }

    /// The probe centered at `position` [Å], with unit total intensity.
    ///
    /// Translation is a Fourier-domain phase ramp, so sub-pixel positions are
    /// exact rather than interpolated.
    pub fn probe_at(&self, position: [f64; 2], fft: &FftPlan2) -> Result<Wavefunction, EngineError> {
        let mut array = Array2::from_shape_fn(self.coefficients.dim(), |(i, j)| {
            let phase = -TAU * (self.kx[i] * position[0] + self.ky[j] * position[1]);
            self.coefficients[[i, j]] * Complex64::cis(phase)
        });
        fft.inverse_inplace(&mut array);
        Ok(Wavefunction::new(array, self.grid, self.energy_ev)?)
    }
}
