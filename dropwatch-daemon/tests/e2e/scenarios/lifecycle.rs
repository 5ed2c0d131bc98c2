//! Startup and shutdown sequencing.

use std::time::Duration;

use dropwatch_daemon::modules::ModuleRegistry;
use dropwatch_daemon::orchestrator::{MONITOR_MODULE, Orchestrator};
use dropwatch_dropmon::MonitorState;
use dropwatch_dropmon::consts::{
    NET_DM_CMD_CONFIG, NET_DM_CMD_START, NET_DM_CMD_STOP, NET_DM_GRP_ALERT,
};
use dropwatch_dropmon::testing::{AlertFixture, MockKernel};

use crate::helpers::config::test_config;
use crate::helpers::recv_msg;
use crate::helpers::sinks::capture_registry;

const EPERM: i32 = 1;
const EOPNOTSUPP: i32 = 95;

#[tokio::test]
async fn test_e2e_missing_family_is_fatal() {
    let kernel = MockKernel::without_family();
    let mut orchestrator = Orchestrator::build_with_exporters(
        test_config(),
        kernel.transport(),
        ModuleRegistry::new(),
    )
    .unwrap();

    let err = orchestrator.start().await.unwrap_err();
    assert!(
        err.to_string().contains("failed to initialize drop monitor"),
        "unexpected error: {err}"
    );
    assert!(kernel.commands().is_empty());
}

#[tokio::test]
async fn test_e2e_enable_failure_is_fatal() {
    let kernel = MockKernel::new();
    kernel.fail_command(NET_DM_CMD_START, EPERM);
    let mut orchestrator = Orchestrator::build_with_exporters(
        test_config(),
        kernel.transport(),
        ModuleRegistry::new(),
    )
    .unwrap();

    let err = orchestrator.start().await.unwrap_err();
    assert!(err.to_string().contains("failed to enable drop monitoring"));
    assert!(!kernel.is_member(NET_DM_GRP_ALERT));
}

#[tokio::test]
async fn test_e2e_configure_failure_is_not_fatal() {
    let kernel = MockKernel::new();
    kernel.fail_command(NET_DM_CMD_CONFIG, EOPNOTSUPP);
    let (registry, mut rx) = capture_registry();
    let mut orchestrator =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();

    orchestrator.start().await.unwrap();
    assert_eq!(orchestrator.monitor_state(), MonitorState::Receiving);
    assert!(kernel.inject_alert(&AlertFixture::software("kfree_skb")));
    recv_msg(&mut rx).await;

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_e2e_monitor_is_configured_from_config() {
    let kernel = MockKernel::new();
    let mut config = test_config();
    config.monitor.trunc_len = 128;
    let mut orchestrator =
        Orchestrator::build_with_exporters(config, kernel.transport(), ModuleRegistry::new())
            .unwrap();
    orchestrator.start().await.unwrap();

    assert_eq!(kernel.alert_mode(), Some(1));
    assert_eq!(kernel.trunc_len(), Some(128));
    assert!(kernel.is_member(NET_DM_GRP_ALERT));

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_e2e_subscription_failure_rolls_back() {
    let kernel = MockKernel::new();
    kernel.fail_membership();
    let mut orchestrator = Orchestrator::build_with_exporters(
        test_config(),
        kernel.transport(),
        ModuleRegistry::new(),
    )
    .unwrap();

    assert!(orchestrator.start().await.is_err());
    assert!(!kernel.sw_enabled());
    assert!(!kernel.hw_enabled());
    assert_eq!(orchestrator.monitor_state(), MonitorState::Closed);
}

#[tokio::test]
async fn test_e2e_shutdown_disables_monitoring_once() {
    let kernel = MockKernel::new();
    let (registry, _rx) = capture_registry();
    let mut orchestrator =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();
    orchestrator.start().await.unwrap();

    orchestrator.shutdown().await.unwrap();
    orchestrator.shutdown().await.unwrap();

    let stops = kernel
        .commands()
        .into_iter()
        .filter(|&cmd| cmd == NET_DM_CMD_STOP)
        .count();
    assert_eq!(stops, 1);
    assert!(!kernel.is_member(NET_DM_GRP_ALERT));
    assert_eq!(orchestrator.monitor_state(), MonitorState::Closed);
}

#[tokio::test]
async fn test_e2e_monitoring_left_enabled_when_configured() {
    let kernel = MockKernel::new();
    let mut config = test_config();
    config.monitor.disable_on_exit = false;
    let mut orchestrator =
        Orchestrator::build_with_exporters(config, kernel.transport(), ModuleRegistry::new())
            .unwrap();
    orchestrator.start().await.unwrap();
    orchestrator.shutdown().await.unwrap();

    assert!(kernel.sw_enabled());
    assert!(kernel.hw_enabled());
    assert!(!kernel.commands().contains(&NET_DM_CMD_STOP));
}

#[tokio::test]
async fn test_e2e_start_twice_is_rejected() {
    let kernel = MockKernel::new();
    let mut orchestrator = Orchestrator::build_with_exporters(
        test_config(),
        kernel.transport(),
        ModuleRegistry::new(),
    )
    .unwrap();
    orchestrator.start().await.unwrap();
    assert!(orchestrator.start().await.is_err());
    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_e2e_run_returns_on_shutdown_token() {
    let kernel = MockKernel::new();
    let (registry, _rx) = capture_registry();
    let mut orchestrator =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();
    let token = orchestrator.shutdown_token();

    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });
    tokio::time::timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("run did not return")
        .unwrap();
    cancel.await.unwrap();

    assert_eq!(orchestrator.monitor_state(), MonitorState::Closed);
    assert!(!kernel.sw_enabled());
}

#[tokio::test]
async fn test_e2e_health_follows_monitor_state() {
    let kernel = MockKernel::new();
    let (registry, _rx) = capture_registry();
    let mut orchestrator =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();

    let before = orchestrator.health().await;
    assert!(before.status.is_unhealthy());
    assert_eq!(before.modules[0].name, MONITOR_MODULE);

    orchestrator.start().await.unwrap();
    let running = orchestrator.health().await;
    assert!(running.status.is_healthy(), "status: {:?}", running.status);
    assert_eq!(running.modules.len(), 2);

    orchestrator.shutdown().await.unwrap();
    let after = orchestrator.health().await;
    assert!(after.status.is_unhealthy());
}
