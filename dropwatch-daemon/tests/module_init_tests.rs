//! Exporter initialization from configuration.

use dropwatch_core::config::{
    ConsoleExporterConfig, DropwatchConfig, PcapExporterConfig, TelegrafExporterConfig,
};
use dropwatch_daemon::modules::{self, init_exporters};

#[test]
fn test_no_sections_no_exporters() {
    let registry = init_exporters(&DropwatchConfig::default(), false);
    assert_eq!(registry.count(), 0);
}

#[test]
fn test_verbose_adds_console() {
    let registry = init_exporters(&DropwatchConfig::default(), true);
    assert_eq!(registry.names(), vec!["console"]);
}

#[test]
fn test_all_sections_in_order() {
    let mut config = DropwatchConfig::default();
    config.exporters.telegraf = Some(TelegrafExporterConfig::default());
    config.exporters.pcap = Some(PcapExporterConfig::default());
    config.exporters.console = Some(ConsoleExporterConfig::default());

    let registry = init_exporters(&config, false);
    assert_eq!(registry.names(), vec!["console", "pcap", "telegraf"]);
    assert_eq!(registry.enabled_count(), 3);
    assert_eq!(registry.export_handles().len(), 3);
}

#[test]
fn test_console_section_overrides_are_applied() {
    let mut config = DropwatchConfig::default();
    config.exporters.console = Some(ConsoleExporterConfig {
        pretty: true,
        queue_capacity: Some(8),
        drop_policy: Some("newest".to_owned()),
    });
    let handle = modules::console::init(&config, false).expect("console exporter");
    assert_eq!(handle.name, "console");
}

#[test]
fn test_invalid_telegraf_section_is_skipped() {
    let mut config = DropwatchConfig::default();
    config.exporters.telegraf = Some(TelegrafExporterConfig {
        device_ip: "not-an-ip".to_owned(),
        ..TelegrafExporterConfig::default()
    });
    config.exporters.pcap = Some(PcapExporterConfig::default());

    assert!(modules::telegraf::init(&config).is_none());
    let registry = init_exporters(&config, false);
    assert_eq!(registry.names(), vec!["pcap"]);
}

#[test]
fn test_invalid_drop_policy_override_is_skipped() {
    let mut config = DropwatchConfig::default();
    config.exporters.pcap = Some(PcapExporterConfig {
        drop_policy: Some("random".to_owned()),
        ..PcapExporterConfig::default()
    });
    assert!(modules::pcap::init(&config).is_none());
}
