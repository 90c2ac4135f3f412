//! # Simulate CRs
//!
//! Accumulates cosmic ray hits over a sequence of exposures of a blank detector:
//! * Allocates a zeroed image of the requested size.
//! * For each frame, injects the cosmic rays striking the detector during one exposure.
//! * Logs a summary of each frame, and optionally writes all summaries to a JSON file.
//!
use clap::Parser;
use cr_synth::{InjectionSummary, SimulationConfig, inject, inject_parallel};
use cr_synth_common::{SpanEvents, TracerOptions, init_tracing};
use miette::IntoDiagnostic;
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::{fs::File, io::BufWriter, path::PathBuf};
use tracing::{info, instrument, level_filters::LevelFilter};

/// [clap] derived struct to handle command line parameters.
#[derive(Debug, Parser)]
#[clap(author, version = cr_synth_common::version!(), about)]
struct Cli {
    /// JSON file of physical constants, absent fields take their default values
    #[clap(long)]
    config: Option<PathBuf>,

    /// Number of pixel rows of the detector
    #[clap(long, default_value = "4096")]
    rows: usize,

    /// Number of pixel columns of the detector
    #[clap(long, default_value = "4096")]
    cols: usize,

    /// Exposure time of each frame, in seconds
    #[clap(long, default_value = "3.04")]
    exposure_time: f64,

    /// Number of frames to accumulate
    #[clap(long, default_value = "500")]
    frames: usize,

    /// Seed of the random number generator
    #[clap(long, env = "CR_SYNTH_SEED", default_value = "47")]
    seed: u64,

    /// If set, each frame's trails are computed on the rayon thread pool
    #[clap(long)]
    parallel: bool,

    /// If set, the per-frame summaries are written to this JSON file
    #[clap(long)]
    summary: Option<PathBuf>,

    /// Determines whether spans are logged as well as events
    #[clap(long, default_value = "none")]
    span_events: SpanEvents,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct FrameSummary {
    frame: usize,
    #[serde(flatten)]
    injection: InjectionSummary,
}

fn main() -> miette::Result<()> {
    let args = Cli::parse();

    init_tracing(&TracerOptions::new(LevelFilter::INFO, args.span_events)).into_diagnostic()?;

    let config = match &args.config {
        Some(path) => SimulationConfig::from_path(path).into_diagnostic()?,
        None => SimulationConfig::default(),
    };
    info!("Using configuration: {config:?}");

    let mut image = Array2::<f64>::zeros((args.rows, args.cols));
    let mut rng = StdRng::seed_from_u64(args.seed);

    let summaries = (0..args.frames)
        .map(|frame| run_frame(&args, &config, &mut image, &mut rng, frame))
        .collect::<miette::Result<Vec<_>>>()?;

    info!(
        "Injected {} cosmic rays over {} frames, {} counts in total, {} pixels hit",
        summaries.iter().map(|s| s.injection.events).sum::<usize>(),
        summaries.len(),
        image.sum(),
        image.iter().filter(|&&v| v > 0.0).count()
    );

    if let Some(path) = &args.summary {
        let writer = BufWriter::new(File::create(path).into_diagnostic()?);
        serde_json::to_writer_pretty(writer, &summaries).into_diagnostic()?;
        info!("Wrote frame summaries to {}", path.display());
    }
    Ok(())
}

#[instrument(skip_all, fields(frame = frame))]
fn run_frame(
    args: &Cli,
    config: &SimulationConfig,
    image: &mut Array2<f64>,
    rng: &mut StdRng,
    frame: usize,
) -> miette::Result<FrameSummary> {
    let injection = if args.parallel {
        inject_parallel(image, args.exposure_time, config, rng.random())
    } else {
        inject(image, args.exposure_time, config, rng)
    }
    .into_diagnostic()?;

    info!(
        "Frame {frame}: {} cosmic rays, {} counts",
        injection.events, injection.deposited_counts
    );
    Ok(FrameSummary { frame, injection })
}
