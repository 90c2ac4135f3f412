//! Injects cosmic ray trails into a detector image.
use crate::{
    config::{ConfigError, DetectorConfig, SimulationConfig, validate_exposure_time},
    events::{CrEvent, sample_events},
    sampling::SamplerError,
    traversal::{GridBounds, PixelCoord, traverse},
};
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Poisson, PoissonError};
use rayon::{
    iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator},
    slice::ParallelSlice,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, trace};

/// Guards against absurd Poisson draws for the number of events in one exposure.
pub const MAX_EVENTS_PER_EXPOSURE: usize = 100_000_000;

/// Number of events handled by each worker stream of [inject_parallel].
const EVENTS_PER_CHUNK: usize = 64;

#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Sampler error: {0}")]
    Sampler(#[from] SamplerError),
    #[error("Invalid Poisson distribution: {0}")]
    Poisson(#[from] PoissonError),
    #[error("Invalid event count {0}")]
    InvalidEventCount(f64),
    #[error("Trail pixel ({i}, {j}) outside image of shape ({rows}, {cols})")]
    OutOfBoundsTrail {
        i: usize,
        j: usize,
        rows: usize,
        cols: usize,
    },
}

/// Totals for one call to [inject] or [inject_parallel].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InjectionSummary {
    /// Number of cosmic rays drawn.
    pub events: usize,
    /// Number of pixel increments, a pixel hit by two trails counts twice.
    pub pixels_hit: usize,
    /// Sum of all counts added to the image.
    pub deposited_counts: f64,
}

/// Counts to be added to one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Deposit {
    i: usize,
    j: usize,
    counts: f64,
}

/// Adds the cosmic rays hitting the detector during an exposure of `exposure_time` seconds
/// to `image`, in counts.
///
/// The configuration is validated, and the samplers are built, before anything is drawn
/// from `rng`. Every deposit is drawn before `image` is written, so on error the image is
/// left unchanged.
#[instrument(skip_all, fields(rows, cols, exposure_time, events), err(level = "error"))]
pub fn inject<R>(
    image: &mut Array2<f64>,
    exposure_time: f64,
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<InjectionSummary, InjectionError>
where
    R: Rng + ?Sized,
{
    let bounds = prepare(image, exposure_time, config)?;
    let events = draw_events(bounds, exposure_time, config, rng)?;

    let deposits = events
        .iter()
        .map(|event| deposit_event(event, bounds, &config.detector, &mut *rng))
        .collect::<Result<Vec<_>, _>>()?;

    let mut summary = InjectionSummary {
        events: events.len(),
        ..Default::default()
    };
    apply_deposits(image, deposits.iter().flatten(), &mut summary)?;
    debug!(
        "Deposited {} counts over {} pixels",
        summary.deposited_counts, summary.pixels_hit
    );
    Ok(summary)
}

/// As [inject], but the per-event work is spread over the rayon thread pool.
///
/// A master generator seeded from `seed` draws the events and one seed per chunk of
/// events, each chunk then draws its charges from its own generator. Deposits are merged
/// in chunk order, so the result depends on `seed` only, not on the number of threads.
#[instrument(skip_all, fields(rows, cols, exposure_time, events), err(level = "error"))]
pub fn inject_parallel(
    image: &mut Array2<f64>,
    exposure_time: f64,
    config: &SimulationConfig,
    seed: u64,
) -> Result<InjectionSummary, InjectionError> {
    let bounds = prepare(image, exposure_time, config)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let events = draw_events(bounds, exposure_time, config, &mut rng)?;

    let chunk_seeds = (0..events.len().div_ceil(EVENTS_PER_CHUNK))
        .map(|_| rng.random::<u64>())
        .collect::<Vec<_>>();

    let chunks = events
        .par_chunks(EVENTS_PER_CHUNK)
        .zip(chunk_seeds.into_par_iter())
        .map(|(chunk, chunk_seed)| {
            let mut chunk_rng = StdRng::seed_from_u64(chunk_seed);
            chunk
                .iter()
                .map(|event| deposit_event(event, bounds, &config.detector, &mut chunk_rng))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Vec<Result<_, InjectionError>>>()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let mut summary = InjectionSummary {
        events: events.len(),
        ..Default::default()
    };
    apply_deposits(image, chunks.iter().flatten().flatten(), &mut summary)?;
    debug!(
        "Deposited {} counts over {} pixels",
        summary.deposited_counts, summary.pixels_hit
    );
    Ok(summary)
}

/// Validates the inputs and records them to the current span.
fn prepare(
    image: &Array2<f64>,
    exposure_time: f64,
    config: &SimulationConfig,
) -> Result<GridBounds, InjectionError> {
    config.validate()?;
    validate_exposure_time(exposure_time)?;

    let bounds = GridBounds::from(image.dim());
    let span = tracing::Span::current();
    span.record("rows", bounds.rows);
    span.record("cols", bounds.cols);
    span.record("exposure_time", exposure_time);
    Ok(bounds)
}

/// Draws the number of cosmic rays in the exposure, then their parameters.
fn draw_events<R>(
    bounds: GridBounds,
    exposure_time: f64,
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<Vec<CrEvent>, InjectionError>
where
    R: Rng + ?Sized,
{
    let count = draw_event_count(config.flux.expected_events(exposure_time), rng)?;
    tracing::Span::current().record("events", count);
    Ok(sample_events(count, bounds, &config.event_bounds, rng)?)
}

fn draw_event_count<R>(mean: f64, rng: &mut R) -> Result<usize, InjectionError>
where
    R: Rng + ?Sized,
{
    if mean <= 0.0 {
        return Ok(0);
    }
    let count = Poisson::new(mean)?.sample(rng);
    if !count.is_finite() || count < 0.0 || count > MAX_EVENTS_PER_EXPOSURE as f64 {
        return Err(InjectionError::InvalidEventCount(count));
    }
    Ok(count as usize)
}

/// Draws a Poisson distributed number of counts, zero if `mean` is not positive.
fn draw_counts<R>(mean: f64, rng: &mut R) -> Result<f64, InjectionError>
where
    R: Rng + ?Sized,
{
    if mean <= 0.0 {
        return Ok(0.0);
    }
    Ok(Poisson::new(mean)?.sample(rng))
}

/// Where the trail of `event` ends, kept within `[1, dim - 1]` on both axes.
fn trail_end(event: &CrEvent, bounds: GridBounds, pixel_size: f64) -> PixelCoord {
    let length = event.path_length / pixel_size;
    let clip = |value: f64, dim: usize| value.max(1.0).min(dim as f64 - 1.0);
    PixelCoord::new(
        clip(event.position.i + length * event.direction.cos(), bounds.rows),
        clip(event.position.j + length * event.direction.sin(), bounds.cols),
    )
}

/// Computes the counts the trail of `event` leaves in each pixel it crosses.
fn deposit_event<R>(
    event: &CrEvent,
    bounds: GridBounds,
    detector: &DetectorConfig,
    rng: &mut R,
) -> Result<Vec<Deposit>, InjectionError>
where
    R: Rng + ?Sized,
{
    let end = trail_end(event, bounds, detector.pixel_size);
    let segment = traverse(event.position, end, bounds);
    trace!(
        "Trail from {:?} to {:?} crosses {} pixels",
        event.position,
        end,
        segment.len()
    );

    let counts_per_pixel = detector.counts_per_pixel(event.energy_loss);
    segment
        .iter()
        .map(|chord| {
            let mean = counts_per_pixel * detector.path_length_3d(chord.length);
            Ok(Deposit {
                i: chord.i,
                j: chord.j,
                counts: draw_counts(mean, &mut *rng)?,
            })
        })
        .collect()
}

/// Adds `deposits` to `image`, after checking that every one of them lies within it.
fn apply_deposits<'a, I>(
    image: &mut Array2<f64>,
    deposits: I,
    summary: &mut InjectionSummary,
) -> Result<(), InjectionError>
where
    I: IntoIterator<Item = &'a Deposit>,
    I::IntoIter: Clone,
{
    let deposits = deposits.into_iter();
    let (rows, cols) = image.dim();
    if let Some(outside) = deposits.clone().find(|d| d.i >= rows || d.j >= cols) {
        return Err(InjectionError::OutOfBoundsTrail {
            i: outside.i,
            j: outside.j,
            rows,
            cols,
        });
    }
    for deposit in deposits {
        if let Some(pixel) = image.get_mut((deposit.i, deposit.j)) {
            *pixel += deposit.counts;
            summary.pixels_hit += 1;
            summary.deposited_counts += deposit.counts;
        }
    }
    Ok(())
}
