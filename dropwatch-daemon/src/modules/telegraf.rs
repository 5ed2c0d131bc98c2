//! Telegraf exporter initialization.

use dropwatch_core::config::DropwatchConfig;
use dropwatch_exporter::{Exporter, TelegrafConfig, TelegrafSink};

use super::ModuleHandle;

/// Initialize the telegraf exporter.
///
/// Returns `None` if `[exporters.telegraf]` is absent or invalid.
pub fn init(config: &DropwatchConfig) -> Option<ModuleHandle> {
    let section = config.exporters.telegraf.as_ref()?;

    let telegraf_config = match TelegrafConfig::from_core(section, &config.exporters) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "invalid telegraf exporter config, skipping");
            return None;
        }
    };

    tracing::info!(
        conn_addr = %telegraf_config.conn_addr,
        interval_ms = telegraf_config.send_interval.as_millis() as u64,
        "initializing telegraf exporter"
    );
    let exporter = Exporter::new(
        TelegrafSink::new(&telegraf_config),
        telegraf_config.settings.clone(),
    );
    Some(ModuleHandle::from_exporter(exporter))
}
