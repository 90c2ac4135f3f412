//! Plumbing shared by the binaries of the workspace.
//!
//! Provides tracing subscriber initialisation and the [version] macro.
pub use const_format;
pub use git_version;

use clap::ValueEnum;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Expands to a version string of the form `0.1.0 (git-describe)`.
#[macro_export]
macro_rules! version {
    () => {
        $crate::const_format::concatcp!(
            env!("CARGO_PKG_VERSION"),
            " (",
            $crate::git_version::git_version!(args = ["--always", "--dirty"], fallback = "unknown"),
            ")"
        )
    };
}

#[derive(Debug, Error)]
pub enum TracerError {
    #[error("Invalid log filter directive: {0}")]
    Filter(#[from] tracing_subscriber::filter::FromEnvError),
    #[error("Subscriber already installed: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Determines whether span open/close events are logged.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum SpanEvents {
    /// Only log events, not spans.
    #[default]
    None,
    /// Log when spans close, including their busy/idle times.
    Close,
    /// Log span creation and closing.
    Full,
}

impl From<SpanEvents> for FmtSpan {
    fn from(value: SpanEvents) -> Self {
        match value {
            SpanEvents::None => FmtSpan::NONE,
            SpanEvents::Close => FmtSpan::CLOSE,
            SpanEvents::Full => FmtSpan::NEW | FmtSpan::CLOSE,
        }
    }
}

/// Options controlling the standard tracing subscriber.
#[derive(Clone, Debug)]
pub struct TracerOptions {
    /// Level used when `RUST_LOG` is not set.
    pub default_level: LevelFilter,
    pub span_events: SpanEvents,
}

impl TracerOptions {
    pub fn new(default_level: LevelFilter, span_events: SpanEvents) -> Self {
        Self {
            default_level,
            span_events,
        }
    }
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self::new(LevelFilter::INFO, SpanEvents::None)
    }
}

/// Installs the global `fmt` subscriber, filtered by `RUST_LOG` if set.
pub fn init_tracing(options: &TracerOptions) -> Result<(), TracerError> {
    let filter = EnvFilter::builder()
        .with_default_directive(options.default_level.into())
        .from_env()?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_span_events(options.span_events.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_events_map_to_fmt_span() {
        assert_eq!(FmtSpan::from(SpanEvents::None), FmtSpan::NONE);
        assert_eq!(FmtSpan::from(SpanEvents::Close), FmtSpan::CLOSE);
        assert_eq!(
            FmtSpan::from(SpanEvents::Full),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
    }

    #[test]
    fn version_contains_package_version() {
        assert!(version!().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
