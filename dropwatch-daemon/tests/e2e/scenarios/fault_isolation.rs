//! Exporter fault isolation.
//!
//! A stuck or broken exporter must not keep alerts from the others.

use dropwatch_daemon::modules::ModuleRegistry;
use dropwatch_daemon::orchestrator::Orchestrator;
use dropwatch_dropmon::testing::{AlertFixture, MockKernel};

use crate::helpers::config::test_config;
use crate::helpers::recv_msg;
use crate::helpers::sinks::{BrokenSink, CaptureSink, StuckSink, handle_for};

#[tokio::test]
async fn test_e2e_stuck_exporter_does_not_block_others() {
    let kernel = MockKernel::new();
    let (capture, mut rx) = CaptureSink::new("capture");
    let mut registry = ModuleRegistry::new();
    registry.register(handle_for(StuckSink));
    registry.register(handle_for(capture));

    let mut orchestrator =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();
    orchestrator.start().await.unwrap();
    assert_eq!(orchestrator.running_exporters(), 2);

    for pc in 0..50u64 {
        assert!(kernel.inject_alert(&AlertFixture::software("kfree_skb").with_pc(pc)));
    }
    for expected in 0..50u64 {
        assert_eq!(recv_msg(&mut rx).await.alert.pc, Some(expected));
    }

    // stuck exporter is aborted after its stop timeout
    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_e2e_exporter_failing_to_start_is_skipped() {
    let kernel = MockKernel::new();
    let (capture, mut rx) = CaptureSink::new("capture");
    let mut registry = ModuleRegistry::new();
    registry.register(handle_for(BrokenSink));
    registry.register(handle_for(capture));

    let mut orchestrator =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();
    orchestrator.start().await.unwrap();
    assert_eq!(orchestrator.running_exporters(), 1);
    assert_eq!(orchestrator.router().names(), vec!["capture"]);

    let health = orchestrator.health().await;
    assert!(health.status.is_healthy(), "status: {:?}", health.status);
    let broken = health.modules.iter().find(|m| m.name == "broken").unwrap();
    assert!(!broken.enabled);

    assert!(kernel.inject_alert(&AlertFixture::hardware("blackhole_route", "l3_drops")));
    assert_eq!(recv_msg(&mut rx).await.alert.drop_point(), "blackhole_route");

    orchestrator.shutdown().await.unwrap();
}

/// With no exporters at all the daemon still runs and decodes alerts.
#[tokio::test]
async fn test_e2e_runs_without_exporters() {
    let kernel = MockKernel::new();
    let mut orchestrator = Orchestrator::build_with_exporters(
        test_config(),
        kernel.transport(),
        ModuleRegistry::new(),
    )
    .unwrap();
    orchestrator.start().await.unwrap();
    assert_eq!(orchestrator.running_exporters(), 0);

    assert!(kernel.inject_alert(&AlertFixture::software("kfree_skb")));
    let stats = orchestrator.processor_stats();
    crate::helpers::wait_until(|| stats.processed() == 1).await;

    orchestrator.shutdown().await.unwrap();
}
