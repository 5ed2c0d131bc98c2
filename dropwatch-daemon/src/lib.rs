//! dropwatch daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, the `dropwatch` binary (main.rs) is used.

pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod modules;
pub mod orchestrator;
pub mod processor;

use std::path::Path;

use anyhow::Result;

use dropwatch_core::config::DropwatchConfig;
use dropwatch_core::error::{ConfigError, DropwatchError};

/// Load the configuration file, falling back to defaults when it is missing.
///
/// Environment overrides are applied in both cases. Validation is left to
/// the caller so that CLI overrides can be applied first.
///
/// Returns the configuration and whether the file was found.
pub async fn load_config(path: &Path) -> Result<(DropwatchConfig, bool)> {
    let (mut config, found) = match DropwatchConfig::from_file(path).await {
        Ok(config) => (config, true),
        Err(DropwatchError::Config(ConfigError::FileNotFound { .. })) => {
            (DropwatchConfig::default(), false)
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "failed to load config {}: {}",
                path.display(),
                e
            ));
        }
    };
    config.apply_env_overrides();
    Ok((config, found))
}
