//! Physical configuration constants, each with a documented default.
//!
//! The structures deserialize from kebab-case JSON, absent fields take their defaults:
//! ```json
//! {
//!     "flux": { "flux": 8, "area": 0.168 },
//!     "detector": { "gain": 3.8, "pixel-size": 10, "pixel-depth": 5 },
//!     "event-bounds": {
//!         "min-length": 10, "max-length": 2000,
//!         "min-energy-loss": 10, "max-energy-loss": 10000,
//!         "grid-size": 10000,
//!         "path-length": { "slope": -4.33 },
//!         "energy-loss": { "location": 1000, "scale": 300 }
//!     }
//! }
//! ```
use crate::sampling::distributions::{Moyal, PowerLaw};
use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
    #[error("{name} range [{min}, {max}] is empty")]
    EmptyRange {
        name: &'static str,
        min: f64,
        max: f64,
    },
    #[error("Sampling grid needs at least two points, got {0}")]
    GridTooSmall(usize),
    #[error("Cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

fn ensure_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

fn ensure_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}

pub(crate) fn validate_exposure_time(exposure_time: f64) -> Result<(), ConfigError> {
    ensure_positive("exposure-time", exposure_time)
}

/// Rate at which cosmic rays strike the detector.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct FluxConfig {
    /// Cosmic ray flux in cm^-2 s^-1. The default is the value assumed by the JWST ETC.
    pub flux: f64,
    /// Area of the detector in cm^2.
    pub area: f64,
}

impl Default for FluxConfig {
    fn default() -> Self {
        Self {
            flux: 8.0,
            area: 0.168,
        }
    }
}

impl FluxConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("flux", self.flux)?;
        ensure_positive("area", self.area)
    }

    /// Mean number of cosmic rays hitting the detector during an exposure of `exposure_time` seconds.
    pub fn expected_events(&self, exposure_time: f64) -> f64 {
        self.flux * self.area * exposure_time
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct DetectorConfig {
    /// Conversion from deposited energy to counts, in eV/count.
    pub gain: f64,
    /// Side of a pixel, in microns.
    pub pixel_size: f64,
    /// Depth of the pixel's sensitive volume, in microns.
    pub pixel_depth: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            gain: 3.8,
            pixel_size: 10.0,
            pixel_depth: 5.0,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("gain", self.gain)?;
        ensure_positive("pixel-size", self.pixel_size)?;
        ensure_non_negative("pixel-depth", self.pixel_depth)
    }

    /// Converts an energy loss in eV/micron to counts per pixel length traversed.
    pub fn counts_per_pixel(&self, energy_loss: f64) -> f64 {
        energy_loss * self.pixel_size / self.gain
    }

    /// Path length through the pixel's depth, in pixels, of a trail with the given 2-D chord.
    pub fn path_length_3d(&self, chord: f64) -> f64 {
        (self.pixel_depth / self.pixel_size).hypot(chord)
    }
}

/// Support and shape of the distributions that cosmic ray parameters are drawn from.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct EventBounds {
    /// Shortest trail, in microns.
    pub min_length: f64,
    /// Longest trail, in microns.
    pub max_length: f64,
    /// Smallest energy loss, in eV/micron.
    pub min_energy_loss: f64,
    /// Largest energy loss, in eV/micron.
    pub max_energy_loss: f64,
    /// Number of points on the length and energy loss grids.
    /// Increasing this improves the sampling of the distributions at the cost of build time.
    pub grid_size: usize,
    pub path_length: PowerLaw,
    pub energy_loss: Moyal,
}

impl Default for EventBounds {
    fn default() -> Self {
        Self {
            min_length: 10.0,
            max_length: 2000.0,
            min_energy_loss: 10.0,
            max_energy_loss: 10000.0,
            grid_size: 10_000,
            path_length: PowerLaw::default(),
            energy_loss: Moyal::default(),
        }
    }
}

impl EventBounds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("min-length", self.min_length)?;
        ensure_positive("min-energy-loss", self.min_energy_loss)?;
        if !(self.max_length.is_finite() && self.max_length > self.min_length) {
            return Err(ConfigError::EmptyRange {
                name: "length",
                min: self.min_length,
                max: self.max_length,
            });
        }
        if !(self.max_energy_loss.is_finite() && self.max_energy_loss > self.min_energy_loss) {
            return Err(ConfigError::EmptyRange {
                name: "energy-loss",
                min: self.min_energy_loss,
                max: self.max_energy_loss,
            });
        }
        if self.grid_size < 2 {
            return Err(ConfigError::GridTooSmall(self.grid_size));
        }
        if !self.path_length.slope.is_finite() {
            return Err(ConfigError::NonFinite {
                name: "path-length slope",
                value: self.path_length.slope,
            });
        }
        ensure_positive("energy-loss scale", self.energy_loss.scale)
    }
}

/// All constants needed to inject cosmic rays into an image.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimulationConfig {
    pub flux: FluxConfig,
    pub detector: DetectorConfig,
    pub event_bounds: EventBounds,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.flux.validate()?;
        self.detector.validate()?;
        self.event_bounds.validate()
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn defaults_are_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_json_gives_defaults() {
        let config = SimulationConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn partial_json() {
        let config = SimulationConfig::from_json_str(
            r#"
            {
                "flux": { "flux": 0 },
                "detector": { "pixel-depth": 0 },
                "event-bounds": { "grid-size": 500, "energy-loss": { "scale": 150 } }
            }
            "#,
        )
        .unwrap();
        assert_eq!(config.flux.flux, 0.0);
        assert_eq!(config.flux.area, 0.168);
        assert_eq!(config.detector.pixel_depth, 0.0);
        assert_eq!(config.detector.gain, 3.8);
        assert_eq!(config.event_bounds.grid_size, 500);
        assert_eq!(config.event_bounds.energy_loss.scale, 150.0);
        assert_eq!(config.event_bounds.energy_loss.location, 1000.0);
        assert_eq!(config.event_bounds.path_length.slope, -4.33);
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            SimulationConfig::from_json_str(r#"{ "flux": { "flux": "lots" } }"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn non_positive_parameters_rejected() {
        let mut config = SimulationConfig::default();
        config.detector.gain = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { name: "gain", .. })
        ));

        let mut config = SimulationConfig::default();
        config.detector.pixel_size = -10.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { name: "pixel-size", .. })
        ));

        let mut config = SimulationConfig::default();
        config.flux.area = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { name: "area", .. })
        ));

        let mut config = SimulationConfig::default();
        config.event_bounds.energy_loss.scale = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "energy-loss scale",
                ..
            })
        ));

        let mut config = SimulationConfig::default();
        config.event_bounds.min_length = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "min-length",
                ..
            })
        ));
    }

    #[test]
    fn negative_flux_rejected() {
        let mut config = SimulationConfig::default();
        config.flux.flux = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Negative { name: "flux", .. })
        ));
    }

    #[test]
    fn empty_ranges_rejected() {
        let mut config = SimulationConfig::default();
        config.event_bounds.max_length = config.event_bounds.min_length;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyRange { name: "length", .. })
        ));

        let mut config = SimulationConfig::default();
        config.event_bounds.max_energy_loss = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyRange {
                name: "energy-loss",
                ..
            })
        ));

        let mut config = SimulationConfig::default();
        config.event_bounds.grid_size = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GridTooSmall(1))
        ));
    }

    #[test]
    fn unit_conversions() {
        let detector = DetectorConfig::default();
        assert_approx_eq!(detector.counts_per_pixel(380.0), 1000.0, 1e-9);
        assert_approx_eq!(detector.path_length_3d(0.0), 0.5, 1e-15);
        assert_approx_eq!(detector.path_length_3d(1.2), 1.3, 1e-15);
        assert_approx_eq!(
            FluxConfig::default().expected_events(3.04),
            8.0 * 0.168 * 3.04,
            1e-12
        );
    }

    #[test]
    fn exposure_time_must_be_positive() {
        assert!(validate_exposure_time(3.04).is_ok());
        assert!(validate_exposure_time(0.0).is_err());
        assert!(validate_exposure_time(f64::NAN).is_err());
    }
}
