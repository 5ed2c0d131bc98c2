//! Test configuration builders.

use std::path::Path;
use std::time::Duration;

use dropwatch_core::config::{DropwatchConfig, PcapExporterConfig};
use dropwatch_exporter::{DropPolicy, ExporterSettings, StopPolicy};

/// Default configuration with small channels and no exporter sections.
pub fn test_config() -> DropwatchConfig {
    let mut config = DropwatchConfig::default();
    config.monitor.channel_capacity = 64;
    config.exporters.stop_timeout_secs = 2;
    config
}

/// Configuration with only the pcap exporter, writing to `path`.
pub fn pcap_config(path: &Path) -> DropwatchConfig {
    let mut config = test_config();
    config.exporters.pcap = Some(PcapExporterConfig {
        file_name: path.display().to_string(),
        ..PcapExporterConfig::default()
    });
    config
}

/// Exporter settings for capture sinks.
pub fn capture_settings() -> ExporterSettings {
    ExporterSettings {
        queue_capacity: 256,
        drop_policy: DropPolicy::Oldest,
        on_stop: StopPolicy::Drain,
        stop_timeout: Duration::from_secs(1),
    }
}
