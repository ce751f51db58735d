//! The multislice transmit–propagate loop.

use super::error::EngineError;
use super::propagator::PropagatorSet;
use super::transmission::TransmissionSet;
use crate::core::fft::FftPlan2;
use crate::core::wave::Wavefunction;
use tracing::trace;

/// Propagates `wave` through every slice of the cached transmission set,
/// mutating it into the exit wave.
///
/// The per-slice order is fixed: transmit first, then propagate over that
/// slice's thickness. Each slice acts as a thin phase object followed by
/// free-space drift, and reordering the two would change the physics.
pub fn multislice(
    wave: &mut Wavefunction,
    transmission: &TransmissionSet,
    propagators: &PropagatorSet,
    fft: &FftPlan2,
) -> Result<(), EngineError> {
    wave.check_energy(transmission.energy_ev())
        .map_err(|_| EngineError::EnergyMismatch {
            expected_ev: transmission.energy_ev(),
            found_ev: wave.energy_ev(),
        })?;
    if (transmission.energy_ev() - propagators.energy_ev()).abs() > f64::EPSILON {
        return Err(EngineError::EnergyMismatch {
            expected_ev: transmission.energy_ev(),
            found_ev: propagators.energy_ev(),
        });
    }
    transmission.grid().check_match(wave.grid())?;

    for index in 0..transmission.num_slices() {
        transmission.apply(index, wave)?;
        let propagator = propagators.get(transmission.thickness(index))?;
        propagator.apply(wave, fft)?;
        trace!(slice = index, propagated = wave.propagated(), "slice done");
    }
    Ok(())
}
