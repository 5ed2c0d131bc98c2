//! pcap exporter initialization.

use dropwatch_core::config::DropwatchConfig;
use dropwatch_exporter::{Exporter, PcapConfig, PcapSink};

use super::ModuleHandle;

/// Initialize the pcap exporter.
///
/// Returns `None` if `[exporters.pcap]` is absent or invalid.
/// The capture file itself is created when the exporter starts.
pub fn init(config: &DropwatchConfig) -> Option<ModuleHandle> {
    let section = config.exporters.pcap.as_ref()?;

    let pcap_config = match PcapConfig::from_core(section, &config.exporters) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "invalid pcap exporter config, skipping");
            return None;
        }
    };

    tracing::info!(path = %pcap_config.file_name.display(), "initializing pcap exporter");
    let exporter = Exporter::new(PcapSink::new(&pcap_config), pcap_config.settings.clone());
    Some(ModuleHandle::from_exporter(exporter))
}
