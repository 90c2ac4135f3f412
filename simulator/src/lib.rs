//! # Cosmic ray synthesis
//!
//! Corrupts simulated detector images with cosmic ray hits:
//! * Draws cosmic ray positions, directions, path lengths and energy losses, using
//!   inverse-transform sampling of physically motivated densities ([sampling], [events]).
//! * Computes the exact chord each straight trail traverses in every pixel it crosses ([traversal]).
//! * Deposits Poisson distributed charge along each trail into the caller's image ([injection]).
//!
//! The random number generator is always supplied by the caller, so results are
//! reproducible from a seed.
pub mod config;
pub mod events;
pub mod injection;
pub mod sampling;
pub mod traversal;

pub use config::{ConfigError, DetectorConfig, EventBounds, FluxConfig, SimulationConfig};
pub use events::{CrEvent, sample_events};
pub use injection::{InjectionError, InjectionSummary, inject, inject_parallel};
pub use sampling::{
    Density, Grid, InverseCdf, Sampler, SamplerError, build_sampler,
    distributions::{Moyal, PowerLaw, moyal_density, power_law_density},
};
pub use traversal::{GridBounds, PixelChord, PixelCoord, TrailSegment, traverse};
