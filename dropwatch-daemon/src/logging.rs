//! Logging setup from the `[general]` config section.
//!
//! Log lines always go to stderr. stdout carries console exporter output,
//! so the two streams can be redirected separately.

use anyhow::{Result, anyhow, bail};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use dropwatch_core::config::GeneralConfig;

/// Output format selected by `general.log_format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, event fields flattened to the top level.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl LogFormat {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
        }
    }
}

/// Builds the level filter. `RUST_LOG` wins over `general.log_level`.
pub fn env_filter(config: &GeneralConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| anyhow!("invalid log level '{}': {e}", config.log_level))
}

/// Initialize the global tracing subscriber. Call once, before any events are emitted.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format = LogFormat::from_name(&config.log_format)?;
    let filter = env_filter(config)?;

    let output = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize {format:?} tracing subscriber: {e}"))
}
