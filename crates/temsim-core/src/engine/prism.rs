//! The PRISM compact scattering matrix.
//!
//! Phase 1 runs one multislice pass per admitted plane-wave tilt and stores the
//! exit waves as a frequency-indexed basis; this cost is independent of the
//! number of scan positions. Phase 2 synthesizes the exit wave for any probe
//! position as an aperture-weighted, phase-shifted linear combination of the
//! basis, optionally restricted to a periodic window around the probe.

use super::config::SynthesisWindow;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::propagator::PropagatorSet;
use super::transmission::TransmissionSet;
use crate::core::aperture::Aperture;
use crate::core::constants::energy2wavelength;
use crate::core::fft::FftPlan2;
use crate::core::grid::Grid;
use crate::core::wave::Wavefunction;
use ndarray::{Array2, Array3};
use num_complex::Complex64;
use rayon::prelude::*;
use std::f64::consts::TAU;
use tracing::{debug, info};

/// The compact scattering matrix: one stored exit wave per admitted beam.
///
/// Built once per (energy, aperture, potential) combination and shared
/// read-only across all scan positions.
pub struct SMatrix {
    basis: Array3<Complex64>,
    beams: Vec<[isize; 2]>,
    grid: Grid,
    energy_ev: f64,
    interpolation: usize,
    total_thickness: f64,
}

impl SMatrix {
    /// Runs the multislice engine once per admitted beam, in parallel.
    pub fn build(
        transmission: &TransmissionSet,
        propagators: &PropagatorSet,
        aperture: &Aperture,
        interpolation: usize,
        fft: &FftPlan2,
        reporter: &ProgressReporter,
    ) -> Result<Self, EngineError> {
        let grid = *transmission.grid();
        let energy_ev = transmission.energy_ev();
        let interpolation = interpolation.max(1);
        let beams = aperture.admitted_beams(&grid, energy_ev, interpolation);
        if beams.is_empty() {
            return Err(EngineError::Internal(
                "aperture admits no beams on this grid".to_string(),
            ));
        }
        info!(
            beams = beams.len(),
            interpolation, "building scattering matrix"
        );
        reporter.report(Progress::TaskStart {
            total_steps: beams.len() as u64,
        });

        let shape = grid.shape();
        let exit_waves: Vec<Array2<Complex64>> = beams
            .par_iter()
            .map(|&beam| -> Result<Array2<Complex64>, EngineError> {
                let array = tilted_plane_wave(beam, shape);
                let mut wave = Wavefunction::new(array, grid, energy_ev)?;
                super::multislice::multislice(&mut wave, transmission, propagators, fft)?;
                reporter.report(Progress::TaskIncrement);
                Ok(wave.array().clone())
            })
            .collect::<Result<_, _>>()?;
        reporter.report(Progress::TaskFinish);

        let mut basis = Array3::from_elem((beams.len(), shape[0], shape[1]), Complex64::ZERO);
        for (member, exit) in basis.outer_iter_mut().zip(exit_waves.iter()) {
            let mut member = member;
            member.assign(exit);
        }
        let total_thickness: f64 = (0..transmission.num_slices())
            .map(|i| transmission.thickness(i))
            .sum();
        debug!(members = beams.len(), "scattering matrix ready");

        Ok(Self {
            basis,
            beams,
            grid,
            energy_ev,
            interpolation,
            total_thickness,
        })
    }

    pub fn num_beams(&self) -> usize {
        self.beams.len()
    }

    pub fn beams(&self) -> &[[isize; 2]] {
        &self.beams
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn energy_ev(&self) -> f64 {
        self.energy_ev
    }

    pub fn interpolation(&self) -> usize {
        self.interpolation
    }

    /// Synthesizes the exit wave for a probe at `position` [Å].
    ///
    /// Fails with `ApertureMismatch` if `aperture` admits a different beam set
    /// than the one the basis was built from.
    pub fn synthesize(
        &self,
        position: [f64; 2],
        aperture: &Aperture,
        window: SynthesisWindow,
    ) -> Result<Wavefunction, EngineError> {
        let requested = aperture.admitted_beams(&self.grid, self.energy_ev, self.interpolation);
        if requested != self.beams {
            return Err(EngineError::ApertureMismatch {
                expected: self.beams.len(),
                found: requested.len(),
            });
        }

        let weights = self.beam_weights(position, aperture);
        let shape = self.grid.shape();
        let mut exit = Array2::from_elem((shape[0], shape[1]), Complex64::ZERO);

        match window {
            SynthesisWindow::Full => {
                for (weight, member) in weights.iter().zip(self.basis.outer_iter()) {
                    exit.zip_mut_with(&member, |e, b| *e += weight * b);
                }
            }
            SynthesisWindow::Cropped => {
                let sampling = self.grid.sampling();
                let win = [
                    shape[0].div_ceil(self.interpolation),
                    shape[1].div_ceil(self.interpolation),
                ];
                let corner = [
                    (position[0] / sampling[0]).round() as isize - win[0] as isize / 2,
                    (position[1] / sampling[1]).round() as isize - win[1] as isize / 2,
                ];
                for wi in 0..win[0] {
                    let i = (corner[0] + wi as isize).rem_euclid(shape[0] as isize) as usize;
                    for wj in 0..win[1] {
                        let j = (corner[1] + wj as isize).rem_euclid(shape[1] as isize) as usize;
                        let mut acc = Complex64::ZERO;
                        for (weight, member) in weights.iter().zip(self.basis.outer_iter()) {
                            acc += weight * member[[i, j]];
                        }
                        exit[[i, j]] = acc;
                    }
                }
            }
        }

        let mut wave = Wavefunction::new(exit, self.grid, self.energy_ev)?;
        wave.advance(self.total_thickness);
        Ok(wave)
    }

    /// Complex weight per basis member: the aperture coefficient at the beam
    /// frequency times the translation phase ramp, scaled so the synthesized
    /// probe carries unit incident intensity.
    fn beam_weights(&self, position: [f64; 2], aperture: &Aperture) -> Vec<Complex64> {
        let wavelength = energy2wavelength(self.energy_ev);
        let extent = self.grid.extent();
        let n = self.grid.num_pixels() as f64;

        let coefficients: Vec<Complex64> = self
            .beams
            .iter()
            .map(|beam| {
                let kx = beam[0] as f64 / extent[0];
                let ky = beam[1] as f64 / extent[1];
                let alpha = wavelength * (kx * kx + ky * ky).sqrt();
                let ramp = Complex64::cis(-TAU * (kx * position[0] + ky * position[1]));
                aperture.coefficient(alpha, wavelength) * ramp
            })
            .collect();

        let norm = coefficients.iter().map(|c| c.norm_sqr()).sum::<f64>() / n;
        let scale = 1.0 / (n * norm.sqrt());
        coefficients.into_iter().map(|c| c * scale).collect()
    }
}

/// Unit-amplitude plane wave `exp(2πi (m·ix/n0 + n·iy/n1))` for integer beam
/// indices, evaluated exactly on the pixel grid.
fn tilted_plane_wave(beam: [isize; 2], shape: [usize; 2]) -> Array2<Complex64> {
    Array2::from_shape_fn((shape[0], shape[1]), |(i, j)| {
        let phase = TAU
            * (beam[0] as f64 * i as f64 / shape[0] as f64
                + beam[1] as f64 * j as f64 / shape[1] as f64);
        Complex64::cis(phase)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::potential::PotentialStack;
    use crate::engine::probe::ProbeFactory;

    fn setup(value: f64) -> (Grid, TransmissionSet, PropagatorSet, FftPlan2) {
        let grid = Grid::from_shape([9.6, 9.6], [48, 48]).unwrap();
        let slices = vec![
            Array2::from_shape_fn((48, 48), |(i, j)| value * ((i + 2 * j) % 7) as f64),
            Array2::from_shape_fn((48, 48), |(i, j)| value * ((3 * i + j) % 5) as f64),
        ];
        let potential = PotentialStack::with_uniform_thickness(slices, 2.0, grid).unwrap();
        let transmission = TransmissionSet::build(&potential, 80e3);
        let propagators = PropagatorSet::build(&grid, 80e3, potential.thicknesses());
        let fft = FftPlan2::new(grid.shape());
        (grid, transmission, propagators, fft)
    }

    #[test]
    fn basis_member_count_matches_admitted_beams() {
        let (grid, transmission, propagators, fft) = setup(0.0);
        let aperture = Aperture::hard(30.0);
        let reporter = ProgressReporter::new();
        let smatrix =
            SMatrix::build(&transmission, &propagators, &aperture, 2, &fft, &reporter).unwrap();
        let expected = aperture.admitted_beams(&grid, 80e3, 2).len();
        assert_eq!(smatrix.num_beams(), expected);
    }

    #[test]
    fn synthesis_matches_direct_multislice_at_interpolation_one() {
        let (grid, transmission, propagators, fft) = setup(8.0);
        let aperture = Aperture::hard(30.0);
        let reporter = ProgressReporter::new();
        let smatrix =
            SMatrix::build(&transmission, &propagators, &aperture, 1, &fft, &reporter).unwrap();

        let position = [4.1, 5.3];
        let synthesized = smatrix
            .synthesize(position, &aperture, SynthesisWindow::Full)
            .unwrap();

        let factory = ProbeFactory::new(grid, &aperture, 80e3).unwrap();
        let mut direct = factory.probe_at(position, &fft).unwrap();
        super::super::multislice::multislice(&mut direct, &transmission, &propagators, &fft)
            .unwrap();

        let max_diff = synthesized
            .array()
            .iter()
            .zip(direct.array().iter())
            .map(|(a, b)| (a - b).norm())
            .fold(0.0f64, f64::max);
        assert!(max_diff < 1e-8, "max difference {max_diff}");
    }

    #[test]
    fn cropped_window_approximates_full_synthesis() {
        let (_, transmission, propagators, fft) = setup(4.0);
        let aperture = Aperture::hard(30.0);
        let reporter = ProgressReporter::new();
        let smatrix =
            SMatrix::build(&transmission, &propagators, &aperture, 2, &fft, &reporter).unwrap();

        let position = [4.8, 4.8];
        let full = smatrix
            .synthesize(position, &aperture, SynthesisWindow::Full)
            .unwrap();
        let cropped = smatrix
            .synthesize(position, &aperture, SynthesisWindow::Cropped)
            .unwrap();

        // Inside the window the two agree exactly; the cropped wave only
        // zeroes the tail outside it.
        let lost = full.intensity() - cropped.intensity();
        assert!(lost >= -1e-12);
        assert!(lost / full.intensity() < 0.2);
    }

    #[test]
    fn mismatched_aperture_is_rejected() {
        let (_, transmission, propagators, fft) = setup(0.0);
        let aperture = Aperture::hard(30.0);
        let reporter = ProgressReporter::new();
        let smatrix =
            SMatrix::build(&transmission, &propagators, &aperture, 2, &fft, &reporter).unwrap();
        let wider = Aperture::hard(45.0);
        let result = smatrix.synthesize([1.0, 1.0], &wider, SynthesisWindow::Full);
        assert!(matches!(result, Err(EngineError::ApertureMismatch { .. })));
    }
}
