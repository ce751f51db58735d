//! The complete scanning-simulation workflow: build the shared caches, choose
//! the exit-wave source for the configured mode, and run the parallel scan.

use crate::core::fft::FftPlan2;
use crate::core::potential::PotentialStack;
use crate::engine::config::{ScanConfig, ScanMode};
use crate::engine::detector::Detector;
use crate::engine::error::EngineError;
use crate::engine::prism::SMatrix;
use crate::engine::probe::ProbeFactory;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::propagator::PropagatorSet;
use crate::engine::scan::{ExitWaveSource, Measurements, Scan, run_scan};
use crate::engine::transmission::TransmissionSet;
use std::sync::atomic::AtomicBool;
use tracing::{info, instrument};

/// Runs a full scanning simulation over `potential`.
#[instrument(skip_all, name = "scan_workflow")]
pub fn run(
    potential: &PotentialStack,
    scan: &Scan,
    detectors: &[Detector],
    config: &ScanConfig,
    reporter: &ProgressReporter,
) -> Result<Measurements, EngineError> {
    run_with_abort(potential, scan, detectors, config, reporter, None)
}

/// As [`run`], with an abort flag checked between scan positions.
pub fn run_with_abort(
    potential: &PotentialStack,
    scan: &Scan,
    detectors: &[Detector],
    config: &ScanConfig,
    reporter: &ProgressReporter,
    abort: Option<&AtomicBool>,
) -> Result<Measurements, EngineError> {
    // === Phase 0: Shared immutable caches ===
    // Everything the parallel loop reads is built here, before any worker
    // starts: single-writer-then-many-readers.
    reporter.report(Progress::PhaseStart { name: "Caches" });
    info!(
        slices = potential.num_slices(),
        energy_ev = config.energy_ev,
        "building transmission and propagator caches"
    );
    let grid = *potential.grid();
    let fft = FftPlan2::new(grid.shape());
    let transmission = TransmissionSet::build(potential, config.energy_ev);
    let propagators = PropagatorSet::build(&grid, config.energy_ev, potential.thicknesses());
    reporter.report(Progress::PhaseFinish);

    match config.mode {
        ScanMode::Direct => {
            let probe = ProbeFactory::new(grid, &config.aperture, config.energy_ev)?;
            let source = ExitWaveSource::Direct {
                probe: &probe,
                transmission: &transmission,
                propagators: &propagators,
            };
            // === Phase 1: Parallel scan ===
            reporter.report(Progress::PhaseStart { name: "Scan" });
            let measurements = run_scan(&source, scan, detectors, &fft, reporter, abort)?;
            reporter.report(Progress::PhaseFinish);
            info!(positions = measurements.num_positions(), "scan finished");
            Ok(measurements)
        }
        ScanMode::Prism { interpolation } => {
            // === Phase 1: Scattering matrix ===
            reporter.report(Progress::PhaseStart { name: "S-matrix" });
            let smatrix = SMatrix::build(
                &transmission,
                &propagators,
                &config.aperture,
                interpolation,
                &fft,
                reporter,
            )?;
            reporter.report(Progress::PhaseFinish);

            // === Phase 2: Parallel scan via synthesis ===
            let source = ExitWaveSource::Prism {
                smatrix: &smatrix,
                aperture: &config.aperture,
                window: config.window,
            };
            reporter.report(Progress::PhaseStart { name: "Scan" });
            let measurements = run_scan(&source, scan, detectors, &fft, reporter, abort)?;
            reporter.report(Progress::PhaseFinish);
            info!(
                positions = measurements.num_positions(),
                beams = smatrix.num_beams(),
                "scan finished"
            );
            Ok(measurements)
        }
    }
}
