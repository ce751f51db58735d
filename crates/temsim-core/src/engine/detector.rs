//! Detector integration: reducing exit waves to measurable channel values.

use super::error::EngineError;
use crate::core::fft::FftPlan2;
use crate::core::wave::Wavefunction;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Detector geometry. Angular detectors act on the far-field diffraction
/// pattern `|FFT(ψ)|²`; the real-space mask acts on `|ψ|²` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Detector {
    /// Disk detector integrating scattering angles up to `max_mrad`.
    BrightField { max_mrad: f64 },
    /// Annular detector integrating between `inner_mrad` and `outer_mrad`.
    AnnularDark { inner_mrad: f64, outer_mrad: f64 },
    /// Binned diffraction pattern, centered (zero frequency in the middle);
    /// one channel per `bin × bin` block.
    PixelatedFourier { bin: usize },
    /// Weighted real-space integration over `|ψ|²`.
    RealSpaceMask { weights: Array2<f64> },
}

impl Detector {
    /// Number of channels this detector contributes per scan position.
    pub fn num_channels(&self, shape: [usize; 2]) -> usize {
        match self {
            Detector::BrightField { .. } | Detector::AnnularDark { .. } => 1,
            Detector::PixelatedFourier { bin } => {
                let bin = (*bin).max(1);
                shape[0].div_ceil(bin) * shape[1].div_ceil(bin)
            }
            Detector::RealSpaceMask { .. } => 1,
        }
    }

    /// Integrates the exit wave and appends the channel values to `out`.
    ///
    /// `incident_intensity` is the total intensity of the incident wave; all
    /// channels are normalized by it once so measurements are comparable
    /// across scan positions. Pure reduction, no hidden state.
    pub fn integrate(
        &self,
        wave: &Wavefunction,
        fft: &FftPlan2,
        incident_intensity: f64,
        out: &mut Vec<f64>,
    ) -> Result<(), EngineError> {
        let shape = wave.grid().shape();
        match self {
            Detector::BrightField { max_mrad } => {
                let value = self.integrate_angular(wave, fft, 0.0, *max_mrad);
                out.push(value / incident_intensity);
            }
            Detector::AnnularDark {
                inner_mrad,
                outer_mrad,
            } => {
                let value = self.integrate_angular(wave, fft, *inner_mrad, *outer_mrad);
                out.push(value / incident_intensity);
            }
            Detector::PixelatedFourier { bin } => {
                let bin = (*bin).max(1);
                let spectrum = fft.forward(wave.array());
                let n = (shape[0] * shape[1]) as f64;
                let rows = shape[0].div_ceil(bin);
                let cols = shape[1].div_ceil(bin);
                let mut binned = vec![0.0; rows * cols];
                for ((i, j), v) in spectrum.indexed_iter() {
                    let si = (i + shape[0] / 2) % shape[0];
                    let sj = (j + shape[1] / 2) % shape[1];
                    binned[(si / bin) * cols + sj / bin] +=
                        v.norm_sqr() / (n * incident_intensity);
                }
                out.extend_from_slice(&binned);
            }
            Detector::RealSpaceMask { weights } => {
                let found = [weights.dim().0, weights.dim().1];
                if found != shape {
                    return Err(EngineError::ShapeMismatch {
                        context: "detector mask",
                        expected: shape,
                        found,
                    });
                }
                let value: f64 = wave
                    .array()
                    .iter()
                    .zip(weights.iter())
                    .map(|(v, w)| v.norm_sqr() * w)
                    .sum();
                out.push(value / incident_intensity);
            }
        }
        Ok(())
    }

    fn integrate_angular(
        &self,
        wave: &Wavefunction,
        fft: &FftPlan2,
        inner_mrad: f64,
        outer_mrad: f64,
    ) -> f64 {
        let spectrum = fft.forward(wave.array());
        let [kx, ky] = wave.grid().spatial_frequencies();
        let wavelength = wave.wavelength();
        let n = (wave.grid().shape()[0] * wave.grid().shape()[1]) as f64;
        let (inner, outer) = (inner_mrad * 1e-3, outer_mrad * 1e-3);

        let mut total = 0.0;
        for ((i, j), v) in spectrum.indexed_iter() {
            let alpha = wavelength * (kx[i] * kx[i] + ky[j] * ky[j]).sqrt();
            if alpha >= inner && alpha < outer {
                total += v.norm_sqr();
            }
        }
        total / n
    }
}

/// Total channel count of a detector sequence.
pub fn total_channels(detectors: &[Detector], shape: [usize; 2]) -> usize {
    detectors.iter().map(|d| d.num_channels(shape)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Grid;

    fn plane_wave() -> (Wavefunction, FftPlan2) {
        let grid = Grid::from_shape([12.8, 12.8], [64, 64]).unwrap();
        let wave = Wavefunction::plane_wave(grid, 80e3);
        let fft = FftPlan2::new(grid.shape());
        (wave, fft)
    }

    #[test]
    fn plane_wave_lands_entirely_in_bright_field() {
        let (wave, fft) = plane_wave();
        let incident = wave.intensity();
        let mut out = Vec::new();
        Detector::BrightField { max_mrad: 10.0 }
            .integrate(&wave, &fft, incident, &mut out)
            .unwrap();
        Detector::AnnularDark {
            inner_mrad: 40.0,
            outer_mrad: 200.0,
        }
        .integrate(&wave, &fft, incident, &mut out)
        .unwrap();
        assert!((out[0] - 1.0).abs() < 1e-10);
        assert!(out[1].abs() < 1e-12);
    }

    #[test]
    fn integration_is_a_pure_function() {
        let (wave, fft) = plane_wave();
        let incident = wave.intensity();
        let detector = Detector::AnnularDark {
            inner_mrad: 5.0,
            outer_mrad: 50.0,
        };
        let mut first = Vec::new();
        let mut second = Vec::new();
        detector.integrate(&wave, &fft, incident, &mut first).unwrap();
        detector.integrate(&wave, &fft, incident, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn pixelated_channels_sum_to_total_intensity() {
        let (wave, fft) = plane_wave();
        let incident = wave.intensity();
        let detector = Detector::PixelatedFourier { bin: 8 };
        assert_eq!(detector.num_channels([64, 64]), 64);
        let mut out = Vec::new();
        detector.integrate(&wave, &fft, incident, &mut out).unwrap();
        let sum: f64 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-10);
    }

    #[test]
    fn real_space_mask_shape_is_checked() {
        let (wave, fft) = plane_wave();
        let detector = Detector::RealSpaceMask {
            weights: Array2::ones((16, 16)),
        };
        let mut out = Vec::new();
        let result = detector.integrate(&wave, &fft, 1.0, &mut out);
        assert!(matches!(result, Err(EngineError::ShapeMismatch { .. })));
    }

    #[test]
    fn uniform_real_space_mask_recovers_total_intensity() {
        let (wave, fft) = plane_wave();
        let incident = wave.intensity();
        let detector = Detector::RealSpaceMask {
            weights: Array2::ones((64, 64)),
        };
        let mut out = Vec::new();
        detector.integrate(&wave, &fft, incident, &mut out).unwrap();
        assert!((out[0] - 1.0).abs() < 1e-12);
    }
}
