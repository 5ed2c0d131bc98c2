//! Drops captured to a pcap file through the configuration path.

use dropwatch_daemon::orchestrator::Orchestrator;
use dropwatch_dissector::testing::udp_ipv4_frame;
use dropwatch_dropmon::testing::{AlertFixture, MockKernel};
use dropwatch_exporter::pcap::{GLOBAL_HEADER_LEN, PCAP_MAGIC, RECORD_HEADER_LEN};

use crate::helpers::config::pcap_config;
use crate::helpers::wait_until;

#[tokio::test]
async fn test_e2e_pcap_exporter_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drops.pcap");
    let kernel = MockKernel::new();

    let mut orchestrator =
        Orchestrator::build(pcap_config(&path), kernel.transport(), false).unwrap();
    orchestrator.start().await.unwrap();
    assert_eq!(orchestrator.running_exporters(), 1);
    assert_eq!(orchestrator.router().names(), vec!["pcap"]);

    let frame = udp_ipv4_frame([10, 0, 0, 1], 5000, [10, 0, 0, 2], 53);
    for _ in 0..3 {
        let fixture = AlertFixture::software("udp_rcv")
            .with_timestamp_ns(1_700_000_000_500_000_000)
            .with_payload(0x0800, 1500, frame.clone());
        assert!(kernel.inject_alert(&fixture));
    }

    let stats = orchestrator.processor_stats();
    wait_until(|| stats.processed() == 3).await;
    orchestrator.shutdown().await.unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(
        bytes.len(),
        GLOBAL_HEADER_LEN + 3 * (RECORD_HEADER_LEN + frame.len())
    );
    assert_eq!(
        u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
        PCAP_MAGIC
    );

    let record = GLOBAL_HEADER_LEN;
    let u32_at = |off: usize| u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
    assert_eq!(u32_at(record), 1_700_000_000);
    assert_eq!(u32_at(record + 4), 500_000);
    assert_eq!(u32_at(record + 8) as usize, frame.len());
    assert_eq!(u32_at(record + 12), 1500);
}

/// An invalid pcap section disables only that exporter.
#[tokio::test]
async fn test_e2e_invalid_pcap_section_is_skipped() {
    let kernel = MockKernel::new();
    let mut config = pcap_config(std::path::Path::new(""));
    config.exporters.console = Some(Default::default());

    let orchestrator = Orchestrator::build(config, kernel.transport(), false).unwrap();
    let health = orchestrator.health().await;
    let names: Vec<&str> = health.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["drop-monitor", "console"]);
}
