//! Draws the parameters of cosmic ray events.
use crate::{
    config::EventBounds,
    sampling::{Grid, SamplerError, build_sampler},
    traversal::{GridBounds, PixelCoord},
};
use rand::Rng;
use rand_distr::Distribution;
use std::f64::consts::TAU;
use tracing::instrument;

/// A single cosmic ray striking the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrEvent {
    /// Where the trail starts, within the detector, in pixels.
    pub position: PixelCoord,
    /// Direction of the trail in radians, in `[0, 2π)`.
    pub direction: f64,
    /// Length of the trail, in microns.
    pub path_length: f64,
    /// Energy loss rate (dE/dx), in eV/micron.
    pub energy_loss: f64,
}

/// Samples `n` cosmic ray events over a detector of the given extent.
///
/// The length and energy loss samplers are built before any value is drawn from `rng`,
/// so an invalid distribution leaves `rng` untouched.
/// Draws are made in a fixed order: positions of every event, then directions, lengths
/// and energy losses, making the result reproducible for a given `rng` state.
#[instrument(skip_all, level = "debug", fields(n, rows = bounds.rows, cols = bounds.cols), err(level = "error"))]
pub fn sample_events<R>(
    n: usize,
    bounds: GridBounds,
    event_bounds: &EventBounds,
    rng: &mut R,
) -> Result<Vec<CrEvent>, SamplerError>
where
    R: Rng + ?Sized,
{
    let length_sampler = build_sampler(
        &event_bounds.path_length,
        Grid::linspace(
            event_bounds.min_length,
            event_bounds.max_length,
            event_bounds.grid_size,
        )?,
    )?;
    let energy_sampler = build_sampler(
        &event_bounds.energy_loss,
        Grid::linspace(
            event_bounds.min_energy_loss,
            event_bounds.max_energy_loss,
            event_bounds.grid_size,
        )?,
    )?;

    let (rows, cols) = (bounds.rows as f64, bounds.cols as f64);
    let positions = (0..n)
        .map(|_| {
            let i = rng.random::<f64>() * rows;
            let j = rng.random::<f64>() * cols;
            PixelCoord::new(i, j)
        })
        .collect::<Vec<_>>();
    let directions = (0..n)
        .map(|_| rng.random::<f64>() * TAU)
        .collect::<Vec<_>>();
    let lengths = (0..n)
        .map(|_| length_sampler.sample(&mut *rng))
        .collect::<Vec<_>>();
    let energy_losses = (0..n)
        .map(|_| energy_sampler.sample(&mut *rng))
        .collect::<Vec<_>>();

    Ok(positions
        .into_iter()
        .zip(directions)
        .zip(lengths)
        .zip(energy_losses)
        .map(
            |(((position, direction), path_length), energy_loss)| CrEvent {
                position,
                direction,
                path_length,
                energy_loss,
            },
        )
        .collect())
}
