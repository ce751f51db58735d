use crate::core::aperture::Aperture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How exit waves are obtained for each probe position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScanMode {
    /// One full multislice pass per position.
    Direct,
    /// Build the PRISM scattering matrix once, then synthesize per position.
    /// The interpolation factor trades basis size (memory, build time) against
    /// synthesis cost and frequency-sampling density.
    Prism { interpolation: usize },
}

/// Real-space window used when synthesizing an exit wave from the scattering
/// matrix. The crop policy is a tuning strategy, not a physical contract; at
/// interpolation factor 1 with [`SynthesisWindow::Full`] synthesis reproduces
/// direct multislice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynthesisWindow {
    /// Accumulate the basis over the whole grid.
    Full,
    /// Accumulate only within a periodic window of shape `shape / interpolation`
    /// centered on the probe.
    Cropped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub energy_ev: f64,
    pub aperture: Aperture,
    pub mode: ScanMode,
    pub window: SynthesisWindow,
}

#[derive(Default)]
pub struct ScanConfigBuilder {
    energy_ev: Option<f64>,
    aperture: Option<Aperture>,
    mode: Option<ScanMode>,
    window: Option<SynthesisWindow>,
}

impl ScanConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn energy_ev(mut self, energy_ev: f64) -> Self {
        self.energy_ev = Some(energy_ev);
        self
    }

    pub fn aperture(mut self, aperture: Aperture) -> Self {
        self.aperture = Some(aperture);
        self
    }

    pub fn mode(mut self, mode: ScanMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn window(mut self, window: SynthesisWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn build(self) -> Result<ScanConfig, ConfigError> {
        let energy_ev = self
            .energy_ev
            .ok_or(ConfigError::MissingParameter("energy_ev"))?;
        if energy_ev <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "energy_ev",
                reason: format!("must be positive, got {energy_ev}"),
            });
        }

        let mode = self.mode.unwrap_or(ScanMode::Direct);
        if let ScanMode::Prism { interpolation } = mode {
            if interpolation == 0 {
                return Err(ConfigError::InvalidParameter {
                    name: "interpolation",
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        Ok(ScanConfig {
            energy_ev,
            aperture: self
                .aperture
                .ok_or(ConfigError::MissingParameter("aperture"))?,
            mode,
            window: self.window.unwrap_or(SynthesisWindow::Cropped),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_without_energy() {
        let result = ScanConfigBuilder::new()
            .aperture(Aperture::hard(20.0))
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("energy_ev")));
    }

    #[test]
    fn build_fails_without_aperture() {
        let result = ScanConfigBuilder::new().energy_ev(80e3).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("aperture")));
    }

    #[test]
    fn zero_interpolation_is_rejected() {
        let result = ScanConfigBuilder::new()
            .energy_ev(80e3)
            .aperture(Aperture::hard(20.0))
            .mode(ScanMode::Prism { interpolation: 0 })
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter { name: "interpolation", .. })
        ));
    }

    #[test]
    fn defaults_are_direct_mode_with_cropped_window() {
        let config = ScanConfigBuilder::new()
            .energy_ev(80e3)
            .aperture(Aperture::hard(20.0))
            .build()
            .unwrap();
        assert_eq!(config.mode, ScanMode::Direct);
        assert_eq!(config.window, SynthesisWindow::Cropped);
    }
}
