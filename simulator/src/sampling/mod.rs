//! Inverse-transform sampling of arbitrary one-dimensional densities.
//!
//! A [Density] is evaluated on a [Grid], accumulated into a discrete cumulative
//! distribution, and inverted by piecewise-linear interpolation. The resulting
//! [InverseCdf] maps a uniform quantile in `[0, 1]` back onto the grid's support.
//!
//! # Example
//! ```rust
//! use cr_synth::sampling::{Grid, Sampler, build_sampler, distributions::PowerLaw};
//!
//! let grid = Grid::linspace(10.0, 2000.0, 10_000).unwrap();
//! let sampler = build_sampler(&PowerLaw::default(), grid).unwrap();
//! assert_eq!(sampler.invert(0.0).unwrap(), 10.0);
//! ```
pub mod distributions;

use rand::Rng;
use rand_distr::Distribution;
use thiserror::Error;
use tracing::instrument;

/// Errors raised while building or querying a sampler.
///
/// All variants other than [SamplerError::QueryOutOfRange] describe an invalid distribution
/// and are raised before any sampling takes place.
#[derive(Debug, Error, PartialEq)]
pub enum SamplerError {
    #[error("Grid needs at least two points, got {0}")]
    GridTooShort(usize),
    #[error("Grid point {index} is not finite")]
    NonFiniteGrid { index: usize },
    #[error("Grid is not strictly increasing at point {index}")]
    NonMonotonicGrid { index: usize },
    #[error("Density is negative ({value}) at {x}")]
    NegativeDensity { x: f64, value: f64 },
    #[error("Density is not finite at {x}")]
    NonFiniteDensity { x: f64 },
    #[error("Tabulated density has {values} values for a grid of {points} points")]
    TabulatedLengthMismatch { points: usize, values: usize },
    #[error("Cumulative distribution is flat, the density has no mass on the grid")]
    DegenerateDistribution,
    #[error("Quantile {0} outside [0, 1]")]
    QueryOutOfRange(f64),
}

/// A strictly increasing sequence of at least two finite sample points.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid(Vec<f64>);

impl Grid {
    pub fn new(points: Vec<f64>) -> Result<Self, SamplerError> {
        if points.len() < 2 {
            return Err(SamplerError::GridTooShort(points.len()));
        }
        if let Some(index) = points.iter().position(|x| !x.is_finite()) {
            return Err(SamplerError::NonFiniteGrid { index });
        }
        if let Some(index) = points
            .windows(2)
            .position(|pair| matches!(pair, [lower, upper] if lower >= upper))
        {
            return Err(SamplerError::NonMonotonicGrid { index: index + 1 });
        }
        Ok(Self(points))
    }

    /// Creates `size` evenly spaced points from `min` to `max` inclusive.
    pub fn linspace(min: f64, max: f64, size: usize) -> Result<Self, SamplerError> {
        if size < 2 {
            return Err(SamplerError::GridTooShort(size));
        }
        let step = (max - min) / (size - 1) as f64;
        let points = (0..size)
            .map(|k| if k + 1 == size { max } else { min + step * k as f64 })
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn min(&self) -> f64 {
        self.0.first().copied().unwrap_or_default()
    }

    pub fn max(&self) -> f64 {
        self.0.last().copied().unwrap_or_default()
    }
}

/// An unnormalized, non-negative probability density.
///
/// Any `Fn(f64) -> f64` closure is a density.
pub trait Density {
    fn evaluate(&self, x: f64) -> f64;
}

impl<F> Density for F
where
    F: Fn(f64) -> f64,
{
    fn evaluate(&self, x: f64) -> f64 {
        self(x)
    }
}

/// Maps a uniform quantile onto a value drawn from some distribution.
pub trait Sampler {
    /// Returns the value whose cumulative probability is `quantile`.
    fn invert(&self, quantile: f64) -> Result<f64, SamplerError>;
}

/// Piecewise-linear inverse of a discrete cumulative distribution.
#[derive(Clone, Debug)]
pub struct InverseCdf {
    grid: Grid,
    /// Normalised cumulative sum, starts at exactly 0 and ends at exactly 1.
    cdf: Vec<f64>,
}

impl InverseCdf {
    /// Builds a sampler from density values tabulated on `grid`.
    ///
    /// The cumulative sum is shifted so that its first value is zero, i.e. the
    /// mass of the first grid point is discarded.
    pub fn from_tabulated(grid: Grid, values: &[f64]) -> Result<Self, SamplerError> {
        if grid.len() != values.len() {
            return Err(SamplerError::TabulatedLengthMismatch {
                points: grid.len(),
                values: values.len(),
            });
        }
        for (&x, &value) in grid.points().iter().zip(values) {
            if !value.is_finite() {
                return Err(SamplerError::NonFiniteDensity { x });
            }
            if value < 0.0 {
                return Err(SamplerError::NegativeDensity { x, value });
            }
        }

        let first = values.first().copied().unwrap_or_default();
        let mut cdf = values
            .iter()
            .scan(0.0, |total, &value| {
                *total += value;
                Some(*total - first)
            })
            .collect::<Vec<_>>();

        let total = cdf.last().copied().unwrap_or_default();
        if total <= 0.0 || !total.is_finite() {
            return Err(SamplerError::DegenerateDistribution);
        }
        cdf.iter_mut().for_each(|c| *c /= total);

        Ok(Self { grid, cdf })
    }

    /// Inverts a quantile already known to lie in `[0, 1]`.
    fn interpolate(&self, quantile: f64) -> f64 {
        //  first index whose cumulative value reaches the quantile
        let upper = self.cdf.partition_point(|&c| c < quantile);
        let Some(lower) = upper.checked_sub(1) else {
            return self.grid.min();
        };
        match (
            self.cdf.get(lower..=upper),
            self.grid.points().get(lower..=upper),
        ) {
            (Some(&[c0, c1]), Some(&[x0, x1])) => x0 + (quantile - c0) / (c1 - c0) * (x1 - x0),
            _ => self.grid.max(),
        }
    }
}

impl Sampler for InverseCdf {
    /// Quantiles in the closed interval `[0, 1]` are accepted, `1` maps to the grid maximum.
    fn invert(&self, quantile: f64) -> Result<f64, SamplerError> {
        if (0.0..=1.0).contains(&quantile) {
            Ok(self.interpolate(quantile))
        } else {
            Err(SamplerError::QueryOutOfRange(quantile))
        }
    }
}

impl Distribution<f64> for InverseCdf {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.interpolate(rng.random::<f64>())
    }
}

/// Evaluates `density` on `grid` and builds its inverse cumulative distribution.
#[instrument(skip_all, level = "debug", fields(points = grid.len(), min = grid.min(), max = grid.max()), err(level = "error"))]
pub fn build_sampler<D>(density: &D, grid: Grid) -> Result<InverseCdf, SamplerError>
where
    D: Density + ?Sized,
{
    let values = grid
        .points()
        .iter()
        .map(|&x| density.evaluate(x))
        .collect::<Vec<_>>();
    InverseCdf::from_tabulated(grid, &values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{SeedableRng, rngs::StdRng};

    fn uniform_sampler() -> InverseCdf {
        build_sampler(&|_: f64| 1.0, Grid::linspace(0.0, 10.0, 11).unwrap()).unwrap()
    }

    #[test]
    fn linspace_endpoints() {
        let grid = Grid::linspace(10.0, 2000.0, 10_000).unwrap();
        assert_eq!(grid.len(), 10_000);
        assert_eq!(grid.min(), 10.0);
        assert_eq!(grid.max(), 2000.0);
    }

    #[test]
    fn grid_too_short() {
        assert_eq!(Grid::new(vec![1.0]), Err(SamplerError::GridTooShort(1)));
        assert_eq!(
            Grid::linspace(0.0, 1.0, 1),
            Err(SamplerError::GridTooShort(1))
        );
    }

    #[test]
    fn grid_not_increasing() {
        assert_eq!(
            Grid::new(vec![0.0, 1.0, 1.0, 2.0]),
            Err(SamplerError::NonMonotonicGrid { index: 2 })
        );
        assert_eq!(
            Grid::linspace(5.0, 1.0, 4),
            Err(SamplerError::NonMonotonicGrid { index: 1 })
        );
    }

    #[test]
    fn grid_not_finite() {
        assert_eq!(
            Grid::new(vec![0.0, f64::NAN]),
            Err(SamplerError::NonFiniteGrid { index: 1 })
        );
    }

    #[test]
    fn uniform_min_median_max() {
        let sampler = uniform_sampler();
        assert_eq!(sampler.invert(0.0).unwrap(), 0.0);
        assert_approx_eq!(sampler.invert(0.5).unwrap(), 5.0, 1e-9);
        assert_approx_eq!(sampler.invert(1.0 - f64::EPSILON).unwrap(), 10.0, 1e-6);
        assert_eq!(sampler.invert(1.0).unwrap(), 10.0);
    }

    #[test]
    fn interpolates_between_grid_points() {
        let sampler = uniform_sampler();
        assert_approx_eq!(sampler.invert(0.25).unwrap(), 2.5, 1e-9);
        assert_approx_eq!(sampler.invert(0.73).unwrap(), 7.3, 1e-9);
    }

    #[test]
    fn inverse_is_monotonic() {
        let sampler = build_sampler(
            &|x: f64| (-x).exp(),
            Grid::linspace(0.0, 5.0, 200).unwrap(),
        )
        .unwrap();
        let values = (0..=100)
            .map(|k| sampler.invert(k as f64 / 100.0).unwrap())
            .collect::<Vec<_>>();
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn out_of_range_queries_rejected() {
        let sampler = uniform_sampler();
        assert_eq!(
            sampler.invert(-0.1),
            Err(SamplerError::QueryOutOfRange(-0.1))
        );
        assert_eq!(sampler.invert(1.5), Err(SamplerError::QueryOutOfRange(1.5)));
        assert!(sampler.invert(f64::NAN).is_err());
    }

    #[test]
    fn negative_density() {
        let result = build_sampler(&|x: f64| x - 1.0, Grid::linspace(0.0, 2.0, 3).unwrap());
        assert_eq!(
            result.unwrap_err(),
            SamplerError::NegativeDensity { x: 0.0, value: -1.0 }
        );
    }

    #[test]
    fn non_finite_density() {
        let result = build_sampler(&|x: f64| x.powf(-2.0), Grid::linspace(0.0, 2.0, 3).unwrap());
        assert_eq!(
            result.unwrap_err(),
            SamplerError::NonFiniteDensity { x: 0.0 }
        );
    }

    #[test]
    fn degenerate_density() {
        let grid = Grid::linspace(0.0, 1.0, 5).unwrap();
        assert_eq!(
            build_sampler(&|_: f64| 0.0, grid.clone()).unwrap_err(),
            SamplerError::DegenerateDistribution
        );
        //  all mass on the first point is discarded by the shift
        assert_eq!(
            InverseCdf::from_tabulated(grid, &[1.0, 0.0, 0.0, 0.0, 0.0]).unwrap_err(),
            SamplerError::DegenerateDistribution
        );
    }

    #[test]
    fn tabulated_length_mismatch() {
        let grid = Grid::linspace(0.0, 1.0, 3).unwrap();
        assert_eq!(
            InverseCdf::from_tabulated(grid, &[1.0, 1.0]).unwrap_err(),
            SamplerError::TabulatedLengthMismatch {
                points: 3,
                values: 2
            }
        );
    }

    #[test]
    fn tabulated_with_empty_region() {
        //  no mass between 1 and 3
        let grid = Grid::new(vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        let sampler = InverseCdf::from_tabulated(grid, &[1.0, 1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_approx_eq!(sampler.invert(0.5).unwrap(), 1.0, 1e-12);
        assert_approx_eq!(sampler.invert(0.75).unwrap(), 3.5, 1e-12);
    }

    #[test]
    fn samples_stay_on_support() {
        let sampler = uniform_sampler();
        let mut rng = StdRng::seed_from_u64(1);
        let samples = sampler.sample_iter(&mut rng).take(10_000).collect::<Vec<_>>();
        assert!(samples.iter().all(|x| (0.0..=10.0).contains(x)));
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert_approx_eq!(mean, 5.0, 0.1);
    }
}
