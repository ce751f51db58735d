//! Relativistic electron-optics constants.
//!
//! All energies are accelerating voltages in electron volts, all lengths are in
//! Ångström, and the interaction parameter is in rad/(V·Å), matching the units
//! of the projected potential consumed by the transmission function.

use std::f64::consts::PI;

/// Electron rest mass [kg].
pub const ELECTRON_MASS: f64 = 9.109_383_701_5e-31;
/// Elementary charge [C].
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;
/// Planck constant [J·s].
pub const PLANCK: f64 = 6.626_070_15e-34;
/// Speed of light [m/s].
pub const SPEED_OF_LIGHT: f64 = 2.997_924_58e8;

/// Relativistic de Broglie wavelength [Å] for an accelerating voltage [eV].
pub fn energy2wavelength(energy_ev: f64) -> f64 {
    let rest = ELECTRON_MASS * SPEED_OF_LIGHT * SPEED_OF_LIGHT;
    let kinetic = ELEMENTARY_CHARGE * energy_ev;
    PLANCK * SPEED_OF_LIGHT / (kinetic * (2.0 * rest + kinetic)).sqrt() * 1e10
}

/// Lorentz factor for an accelerating voltage [eV].
pub fn energy2mass_ratio(energy_ev: f64) -> f64 {
    let rest = ELECTRON_MASS * SPEED_OF_LIGHT * SPEED_OF_LIGHT;
    1.0 + ELEMENTARY_CHARGE * energy_ev / rest
}

/// Interaction parameter σ [rad/(V·Å)] relating projected potential to the
/// phase shift of the transmission function, exp(iσV).
pub fn energy2sigma(energy_ev: f64) -> f64 {
    let gamma = energy2mass_ratio(energy_ev);
    let wavelength_m = energy2wavelength(energy_ev) * 1e-10;
    2.0 * PI * gamma * ELECTRON_MASS * ELEMENTARY_CHARGE * wavelength_m / (PLANCK * PLANCK)
        * 1e-10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, rel: f64) -> bool {
        (a - b).abs() <= rel * b.abs()
    }

    #[test]
    fn wavelength_matches_reference_values() {
        // Kirkland, Advanced Computing in Electron Microscopy, Table 2.1.
        assert!(approx_eq(energy2wavelength(100e3), 0.037014, 1e-4));
        assert!(approx_eq(energy2wavelength(200e3), 0.025079, 1e-4));
        assert!(approx_eq(energy2wavelength(300e3), 0.019687, 1e-4));
    }

    #[test]
    fn sigma_matches_reference_value() {
        assert!(approx_eq(energy2sigma(100e3), 9.2444e-4, 1e-3));
    }

    #[test]
    fn mass_ratio_exceeds_unity() {
        assert!(energy2mass_ratio(80e3) > 1.0);
        assert!(energy2mass_ratio(300e3) > energy2mass_ratio(80e3));
    }
}
