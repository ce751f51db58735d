//! Scan orchestration: enumerate probe positions, dispatch per-position exit
//! wave computation, and assemble detector channels into a measurement array.
//!
//! Positions are embarrassingly parallel: every worker reads the shared
//! immutable caches and writes a disjoint row of the output, so the loop runs
//! on rayon without any synchronization beyond an abort flag and a progress
//! counter.

use super::config::SynthesisWindow;
use super::detector::{Detector, total_channels};
use super::error::EngineError;
use super::multislice::multislice;
use super::prism::SMatrix;
use super::probe::ProbeFactory;
use super::progress::{Progress, ProgressReporter};
use super::propagator::PropagatorSet;
use super::transmission::TransmissionSet;
use crate::core::aperture::Aperture;
use crate::core::fft::FftPlan2;
use crate::core::wave::Wavefunction;
use ndarray::{Array2, Array3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A rectangular grid of probe positions, row-major, endpoint-exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridScan {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub shape: [usize; 2],
}

impl GridScan {
    pub fn positions(&self) -> Vec<[f64; 2]> {
        let step = [
            (self.end[0] - self.start[0]) / self.shape[0] as f64,
            (self.end[1] - self.start[1]) / self.shape[1] as f64,
        ];
        let mut positions = Vec::with_capacity(self.shape[0] * self.shape[1]);
        for row in 0..self.shape[0] {
            for col in 0..self.shape[1] {
                positions.push([
                    self.start[0] + row as f64 * step[0],
                    self.start[1] + col as f64 * step[1],
                ]);
            }
        }
        positions
    }
}

/// The probe positions to simulate. External to the physics; only the output
/// indexing depends on the ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scan {
    Grid(GridScan),
    Custom(Vec<[f64; 2]>),
}

impl Scan {
    pub fn positions(&self) -> Vec<[f64; 2]> {
        match self {
            Scan::Grid(grid) => grid.positions(),
            Scan::Custom(positions) => positions.clone(),
        }
    }

    /// The 2D scan shape, when the positions form a grid.
    pub fn grid_shape(&self) -> Option<[usize; 2]> {
        match self {
            Scan::Grid(grid) => Some(grid.shape),
            Scan::Custom(_) => None,
        }
    }
}

/// Per-position detector channels, indexed by scan position.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurements {
    data: Array2<f64>,
    scan_shape: Option<[usize; 2]>,
}

impl Measurements {
    pub fn num_positions(&self) -> usize {
        self.data.dim().0
    }

    pub fn num_channels(&self) -> usize {
        self.data.dim().1
    }

    /// Channel values for one scan position.
    pub fn position(&self, index: usize) -> &[f64] {
        self.data
            .row(index)
            .to_slice()
            .unwrap_or(&[])
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Reshapes to (rows, cols, channels) for grid scans.
    pub fn into_grid(self) -> Result<Array3<f64>, EngineError> {
        let shape = self.scan_shape.ok_or_else(|| {
            EngineError::Internal("measurements were not produced by a grid scan".to_string())
        })?;
        let channels = self.data.dim().1;
        self.data
            .into_shape_with_order((shape[0], shape[1], channels))
            .map_err(|e| EngineError::Internal(e.to_string()))
    }
}

/// How the orchestrator obtains an exit wave for one probe position.
pub enum ExitWaveSource<'a> {
    Direct {
        probe: &'a ProbeFactory,
        transmission: &'a TransmissionSet,
        propagators: &'a PropagatorSet,
    },
    Prism {
        smatrix: &'a SMatrix,
        aperture: &'a Aperture,
        window: SynthesisWindow,
    },
}

impl ExitWaveSource<'_> {
    fn exit_wave(&self, position: [f64; 2], fft: &FftPlan2) -> Result<Wavefunction, EngineError> {
        match self {
            ExitWaveSource::Direct {
                probe,
                transmission,
                propagators,
            } => {
                let mut wave = probe.probe_at(position, fft)?;
                multislice(&mut wave, transmission, propagators, fft)?;
                Ok(wave)
            }
            ExitWaveSource::Prism {
                smatrix,
                aperture,
                window,
            } => smatrix.synthesize(position, aperture, *window),
        }
    }
}

/// Runs the scan loop: one exit wave and one detector pass per position, in
/// parallel, assembling rows into a [`Measurements`] array.
///
/// The abort flag is checked between positions; in-flight positions finish
/// before the scan returns [`EngineError::Aborted`].
pub fn run_scan(
    source: &ExitWaveSource,
    scan: &Scan,
    detectors: &[Detector],
    fft: &FftPlan2,
    reporter: &ProgressReporter,
    abort: Option<&AtomicBool>,
) -> Result<Measurements, EngineError> {
    let positions = scan.positions();
    if positions.is_empty() {
        return Err(EngineError::EmptyScan);
    }
    let shape = fft.shape();
    let channels = total_channels(detectors, shape);
    let total = positions.len();
    let completed = AtomicUsize::new(0);

    reporter.report(Progress::TaskStart {
        total_steps: total as u64,
    });

    let rows: Vec<Vec<f64>> = positions
        .par_iter()
        .map(|&position| -> Result<Vec<f64>, EngineError> {
            if let Some(flag) = abort {
                if flag.load(Ordering::Relaxed) {
                    return Err(EngineError::Aborted {
                        completed: completed.load(Ordering::Relaxed),
                        total,
                    });
                }
            }
            let wave = source.exit_wave(position, fft)?;
            let mut row = Vec::with_capacity(channels);
            for detector in detectors {
                // Probes are normalized to unit incident intensity when they
                // are built, once, so every position shares the same factor.
                detector.integrate(&wave, fft, 1.0, &mut row)?;
            }
            completed.fetch_add(1, Ordering::Relaxed);
            reporter.report(Progress::TaskIncrement);
            Ok(row)
        })
        .collect::<Result<_, _>>()?;

    reporter.report(Progress::TaskFinish);

    let mut data = Array2::zeros((total, channels));
    for (index, row) in rows.iter().enumerate() {
        for (channel, &value) in row.iter().enumerate() {
            data[[index, channel]] = value;
        }
    }
    Ok(Measurements {
        data,
        scan_shape: scan.grid_shape(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Grid;
    use crate::core::potential::PotentialStack;

    fn setup() -> (Grid, TransmissionSet, PropagatorSet, FftPlan2, ProbeFactory) {
        let grid = Grid::from_shape([9.6, 9.6], [48, 48]).unwrap();
        let slices = vec![Array2::from_shape_fn((48, 48), |(i, j)| {
            5.0 * ((i * 3 + j) % 4) as f64
        })];
        let potential = PotentialStack::with_uniform_thickness(slices, 2.0, grid).unwrap();
        let transmission = TransmissionSet::build(&potential, 80e3);
        let propagators = PropagatorSet::build(&grid, 80e3, potential.thicknesses());
        let fft = FftPlan2::new(grid.shape());
        let probe = ProbeFactory::new(grid, &Aperture::hard(30.0), 80e3).unwrap();
        (grid, transmission, propagators, fft, probe)
    }

    fn detectors() -> Vec<Detector> {
        vec![
            Detector::BrightField { max_mrad: 15.0 },
            Detector::AnnularDark {
                inner_mrad: 40.0,
                outer_mrad: 180.0,
            },
        ]
    }

    #[test]
    fn grid_scan_positions_are_row_major() {
        let scan = GridScan {
            start: [0.0, 0.0],
            end: [4.0, 4.0],
            shape: [2, 2],
        };
        assert_eq!(
            scan.positions(),
            vec![[0.0, 0.0], [0.0, 2.0], [2.0, 0.0], [2.0, 2.0]]
        );
    }

    #[test]
    fn measurements_have_grid_shape_and_channel_count() {
        let (_, transmission, propagators, fft, probe) = setup();
        let source = ExitWaveSource::Direct {
            probe: &probe,
            transmission: &transmission,
            propagators: &propagators,
        };
        let scan = Scan::Grid(GridScan {
            start: [2.0, 2.0],
            end: [7.0, 7.0],
            shape: [2, 2],
        });
        let reporter = ProgressReporter::new();
        let result = run_scan(&source, &scan, &detectors(), &fft, &reporter, None).unwrap();
        assert_eq!(result.num_positions(), 4);
        assert_eq!(result.num_channels(), 2);
        let grid = result.into_grid().unwrap();
        assert_eq!(grid.dim(), (2, 2, 2));
    }

    #[test]
    fn reordering_positions_reorders_rows_only() {
        let (_, transmission, propagators, fft, probe) = setup();
        let source = ExitWaveSource::Direct {
            probe: &probe,
            transmission: &transmission,
            propagators: &propagators,
        };
        let reporter = ProgressReporter::new();
        let positions = vec![[2.0, 2.0], [2.0, 6.0], [6.0, 2.0], [6.0, 6.0]];
        let forward = run_scan(
            &source,
            &Scan::Custom(positions.clone()),
            &detectors(),
            &fft,
            &reporter,
            None,
        )
        .unwrap();
        let mut reversed_positions = positions.clone();
        reversed_positions.reverse();
        let reversed = run_scan(
            &source,
            &Scan::Custom(reversed_positions),
            &detectors(),
            &fft,
            &reporter,
            None,
        )
        .unwrap();
        for i in 0..positions.len() {
            let a = forward.position(i);
            let b = reversed.position(positions.len() - 1 - i);
            for (x, y) in a.iter().zip(b.iter()) {
                assert!((x - y).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn empty_scan_is_rejected() {
        let (_, transmission, propagators, fft, probe) = setup();
        let source = ExitWaveSource::Direct {
            probe: &probe,
            transmission: &transmission,
            propagators: &propagators,
        };
        let reporter = ProgressReporter::new();
        let result = run_scan(
            &source,
            &Scan::Custom(vec![]),
            &detectors(),
            &fft,
            &reporter,
            None,
        );
        assert!(matches!(result, Err(EngineError::EmptyScan)));
    }

    #[test]
    fn pre_set_abort_flag_stops_the_scan() {
        let (_, transmission, propagators, fft, probe) = setup();
        let source = ExitWaveSource::Direct {
            probe: &probe,
            transmission: &transmission,
            propagators: &propagators,
        };
        let reporter = ProgressReporter::new();
        let abort = AtomicBool::new(true);
        let scan = Scan::Custom(vec![[2.0, 2.0], [4.0, 4.0]]);
        let result = run_scan(&source, &scan, &detectors(), &fft, &reporter, Some(&abort));
        assert!(matches!(result, Err(EngineError::Aborted { .. })));
    }
}
