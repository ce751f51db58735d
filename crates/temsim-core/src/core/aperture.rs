//! The probe-forming aperture: which spatial frequencies illuminate the sample,
//! and with what complex coefficient.
//!
//! The aperture is the contract between the probe-shape collaborator and the
//! engine: both the direct-mode probe and the PRISM beam basis are derived from
//! the same admitted-beam enumeration, which is what makes the two modes agree.

use super::constants::energy2wavelength;
use super::grid::Grid;
use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Condenser aperture with a (optionally tapered) semi-angle cutoff and a
/// defocus aberration phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aperture {
    /// Semi-angle cutoff [mrad].
    pub semiangle_cutoff_mrad: f64,
    /// Width of the cosine taper at the cutoff edge, as a fraction of the
    /// cutoff. Zero gives a hard-edged aperture.
    pub rolloff: f64,
    /// Defocus [Å]; positive is underfocus.
    pub defocus: f64,
}

impl Aperture {
    pub fn hard(semiangle_cutoff_mrad: f64) -> Self {
        Self {
            semiangle_cutoff_mrad,
            rolloff: 0.0,
            defocus: 0.0,
        }
    }

    fn cutoff_rad(&self) -> f64 {
        self.semiangle_cutoff_mrad * 1e-3
    }

    /// Aperture amplitude at scattering angle `alpha` [rad], tapered with a
    /// half-cosine over `rolloff * cutoff` at the edge.
    pub fn amplitude(&self, alpha: f64) -> f64 {
        let cutoff = self.cutoff_rad();
        let rolloff = self.rolloff * cutoff;
        if rolloff > 0.0 {
            if alpha > cutoff {
                0.0
            } else if alpha > cutoff - rolloff {
                0.5 * (1.0 + (PI * (alpha - cutoff + rolloff) / rolloff).cos())
            } else {
                1.0
            }
        } else if alpha < cutoff {
            1.0
        } else {
            0.0
        }
    }

    /// Aberration phase χ at scattering angle `alpha` [rad].
    pub fn phase(&self, alpha: f64, wavelength: f64) -> f64 {
        PI * self.defocus * alpha * alpha / wavelength
    }

    /// Complex aperture coefficient, `amplitude * exp(-iχ)`.
    pub fn coefficient(&self, alpha: f64, wavelength: f64) -> Complex64 {
        let amplitude = self.amplitude(alpha);
        if amplitude == 0.0 {
            return Complex64::ZERO;
        }
        amplitude * Complex64::cis(-self.phase(alpha, wavelength))
    }

    /// Enumerates the integer beam indices `(m, n)` admitted by this aperture
    /// on `grid` at `energy_ev`, keeping every `interpolation`-th frequency
    /// per axis. Beam `(m, n)` has spatial frequency `(m / Lx, n / Ly)`.
    ///
    /// The enumeration order is the row-major FFT index order, so it is
    /// deterministic for a fixed grid; the anti-aliasing cutoff is applied on
    /// top of the aperture cutoff.
    pub fn admitted_beams(
        &self,
        grid: &Grid,
        energy_ev: f64,
        interpolation: usize,
    ) -> Vec<[isize; 2]> {
        let wavelength = energy2wavelength(energy_ev);
        let [kx, ky] = grid.spatial_frequencies();
        let antialias_sq = grid.antialias_cutoff().powi(2);
        let shape = grid.shape();
        let f = interpolation.max(1) as isize;

        let mut beams = Vec::new();
        for i in 0..shape[0] {
            let m = fft_index(i, shape[0]);
            if m % f != 0 {
                continue;
            }
            for j in 0..shape[1] {
                let n = fft_index(j, shape[1]);
                if n % f != 0 {
                    continue;
                }
                let k_sq = kx[i] * kx[i] + ky[j] * ky[j];
                if k_sq > antialias_sq {
                    continue;
                }
                let alpha = wavelength * k_sq.sqrt();
                if self.amplitude(alpha) > 0.0 {
                    beams.push([m, n]);
                }
            }
        }
        beams
    }

    /// The Fourier coefficients of the unshifted probe on `grid`: the aperture
    /// coefficient at every admitted frequency, zero elsewhere.
    pub fn probe_coefficients(&self, grid: &Grid, energy_ev: f64) -> Array2<Complex64> {
        let wavelength = energy2wavelength(energy_ev);
        let [kx, ky] = grid.spatial_frequencies();
        let shape = grid.shape();
        let mut coefficients = Array2::from_elem((shape[0], shape[1]), Complex64::ZERO);
        for beam in self.admitted_beams(grid, energy_ev, 1) {
            let [i, j] = beam_to_index(beam, shape);
            let alpha = wavelength * (kx[i] * kx[i] + ky[j] * ky[j]).sqrt();
            coefficients[[i, j]] = self.coefficient(alpha, wavelength);
        }
        coefficients
    }
}

/// Signed FFT frequency index for array index `i` of an axis of length `n`.
pub fn fft_index(i: usize, n: usize) -> isize {
    if i < n.div_ceil(2) {
        i as isize
    } else {
        i as isize - n as isize
    }
}

/// Array indices for a signed beam index pair.
pub fn beam_to_index(beam: [isize; 2], shape: [usize; 2]) -> [usize; 2] {
    [
        beam[0].rem_euclid(shape[0] as isize) as usize,
        beam[1].rem_euclid(shape[1] as isize) as usize,
    ]
}
