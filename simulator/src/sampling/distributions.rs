//! Closed-form densities describing cosmic-ray energy loss and path length.
use super::Density;
use serde::Deserialize;

/// Unnormalized Moyal density, an approximation of the Landau distribution of
/// energy loss of a charged particle passing through the detector.
///
/// `location` is the peak and `scale` the width, both in eV/micron. Requires `scale > 0`.
pub fn moyal_density(x: f64, location: f64, scale: f64) -> f64 {
    let xs = (x - location) / scale;
    f64::exp(-(xs + f64::exp(-xs)) / 2.0)
}

/// Unnormalized power law with the given log-log `slope`.
///
/// Only defined for `x > 0` when the slope is negative.
pub fn power_law_density(x: f64, slope: f64) -> f64 {
    x.powf(slope)
}

/// Energy loss (dE/dx) distribution.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Moyal {
    /// Peak of the distribution, in eV/micron.
    pub location: f64,
    /// Width of the distribution, in eV/micron.
    pub scale: f64,
}

impl Default for Moyal {
    fn default() -> Self {
        Self {
            location: 1000.0,
            scale: 300.0,
        }
    }
}

impl Density for Moyal {
    fn evaluate(&self, x: f64) -> f64 {
        moyal_density(x, self.location, self.scale)
    }
}

/// Path length distribution.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct PowerLaw {
    /// Default from Miles et al. (2021).
    pub slope: f64,
}

impl Default for PowerLaw {
    fn default() -> Self {
        Self { slope: -4.33 }
    }
}

impl Density for PowerLaw {
    fn evaluate(&self, x: f64) -> f64 {
        power_law_density(x, self.slope)
    }
}
