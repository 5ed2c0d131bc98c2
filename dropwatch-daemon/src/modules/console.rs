//! Console exporter initialization.
//!
//! Enabled by an `[exporters.console]` section or by `--verbose`.

use dropwatch_core::config::DropwatchConfig;
use dropwatch_exporter::{ConsoleConfig, ConsoleSink, Exporter};

use super::ModuleHandle;

/// Initialize the console exporter.
///
/// Returns `None` if it is not configured or its section is invalid.
pub fn init(config: &DropwatchConfig, verbose: bool) -> Option<ModuleHandle> {
    let section = match (&config.exporters.console, verbose) {
        (Some(section), _) => section.clone(),
        (None, true) => Default::default(),
        (None, false) => {
            tracing::debug!("console exporter not configured");
            return None;
        }
    };

    let console_config = match ConsoleConfig::from_core(&section, &config.exporters) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "invalid console exporter config, skipping");
            return None;
        }
    };

    let exporter = Exporter::new(
        ConsoleSink::stdout(console_config.pretty),
        console_config.settings,
    );
    Some(ModuleHandle::from_exporter(exporter))
}
