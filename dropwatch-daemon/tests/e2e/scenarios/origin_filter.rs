//! Software/hardware origin selection.

use dropwatch_core::event::DropOrigin;
use dropwatch_daemon::orchestrator::Orchestrator;
use dropwatch_dropmon::testing::{AlertFixture, MockKernel};

use crate::helpers::config::test_config;
use crate::helpers::sinks::capture_registry;
use crate::helpers::{assert_no_msg, recv_msg};

/// With only hardware drops enabled, software alerts never reach exporters.
#[tokio::test]
async fn test_e2e_hardware_only_monitoring() {
    let kernel = MockKernel::new();
    let mut config = test_config();
    config.monitor.sw_drops = false;
    config.monitor.hw_drops = true;

    let (registry, mut rx) = capture_registry();
    let mut orchestrator =
        Orchestrator::build_with_exporters(config, kernel.transport(), registry).unwrap();
    orchestrator.start().await.unwrap();

    assert!(kernel.hw_enabled());
    assert!(!kernel.sw_enabled());

    assert!(!kernel.inject_alert(&AlertFixture::software("kfree_skb")));
    assert!(kernel.inject_alert(&AlertFixture::hardware(
        "ttl_value_is_too_small",
        "l3_exceptions"
    )));
    assert!(!kernel.inject_alert(&AlertFixture::software("tcp_v4_rcv")));

    let msg = recv_msg(&mut rx).await;
    assert_eq!(msg.alert.origin, DropOrigin::Hardware);
    assert_eq!(msg.alert.drop_point(), "ttl_value_is_too_small");
    assert_no_msg(&mut rx).await;

    orchestrator.shutdown().await.unwrap();
    assert!(!kernel.hw_enabled());
}

/// Disabling both origins after a run, then enabling hardware only.
#[tokio::test]
async fn test_e2e_restart_with_hardware_only() {
    let kernel = MockKernel::new();

    let (registry, mut rx) = capture_registry();
    let mut first =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();
    first.start().await.unwrap();
    assert!(kernel.sw_enabled() && kernel.hw_enabled());
    assert!(kernel.inject_alert(&AlertFixture::software("kfree_skb")));
    recv_msg(&mut rx).await;
    first.shutdown().await.unwrap();
    assert!(!kernel.sw_enabled() && !kernel.hw_enabled());

    let mut config = test_config();
    config.monitor.sw_drops = false;
    let (registry, mut rx) = capture_registry();
    let mut second =
        Orchestrator::build_with_exporters(config, kernel.transport(), registry).unwrap();
    second.start().await.unwrap();

    assert!(!kernel.inject_alert(&AlertFixture::software("kfree_skb")));
    assert!(kernel.inject_alert(&AlertFixture::hardware("blackhole_route", "l3_drops")));
    let msg = recv_msg(&mut rx).await;
    assert_eq!(msg.alert.origin, DropOrigin::Hardware);
    assert_no_msg(&mut rx).await;

    second.shutdown().await.unwrap();
}
