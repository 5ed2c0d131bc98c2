//! Alert flow from the kernel to an exporter.

use std::time::{Duration, UNIX_EPOCH};

use dropwatch_core::event::DropOrigin;
use dropwatch_core::types::PacketType;
use dropwatch_daemon::orchestrator::Orchestrator;
use dropwatch_dissector::testing::{tcp_ipv4_frame, udp_ipv6_frame};
use dropwatch_dropmon::testing::{AlertFixture, MockKernel};

use crate::helpers::config::test_config;
use crate::helpers::sinks::capture_registry;
use crate::helpers::{recv_msg, wait_until};

/// Software drop of an IPv4/TCP frame on port 7 "eth0" arrives fully decoded.
#[tokio::test]
async fn test_e2e_software_tcp_drop_is_dissected() {
    let kernel = MockKernel::new();
    let (registry, mut rx) = capture_registry();
    let mut orchestrator =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();
    orchestrator.start().await.unwrap();

    let frame = tcp_ipv4_frame([192, 168, 1, 10], 40000, [192, 168, 1, 20], 80);
    let fixture = AlertFixture::software("tcp_v4_rcv")
        .with_port(7, "eth0")
        .with_timestamp_ns(1_700_000_000_000_000_123)
        .with_payload(0x0800, frame.len() as u32, frame);
    assert!(kernel.inject_alert(&fixture));

    let msg = recv_msg(&mut rx).await;
    let alert = &msg.alert;
    assert_eq!(alert.origin, DropOrigin::Software);
    assert_eq!(alert.symbol.as_deref(), Some("tcp_v4_rcv"));
    assert_eq!(alert.drop_point(), "tcp_v4_rcv");
    assert_eq!(alert.port_ifindex(), Some(7));
    assert_eq!(alert.port_name(), Some("eth0"));
    assert_eq!(
        alert.timestamp,
        UNIX_EPOCH + Duration::new(1_700_000_000, 123)
    );
    assert_eq!(alert.packet.protocol, 0x0800);

    let summary = msg.packet.as_ref().expect("packet summary");
    assert_eq!(summary.packet_type(), PacketType::Transport);
    let ip = summary.ip().unwrap();
    assert_eq!(ip.src_ip.as_deref(), Some("192.168.1.10"));
    assert_eq!(ip.dst_ip.as_deref(), Some("192.168.1.20"));
    assert_eq!(ip.protocol, Some(6));
    let transport = summary.transport().unwrap();
    assert_eq!(transport.src_port, Some(40000));
    assert_eq!(transport.dst_port, Some(80));

    orchestrator.shutdown().await.unwrap();
    assert_eq!(orchestrator.processor_stats().processed(), 1);
}

/// A payload shorter than an Ethernet header is still exported, as Unknown.
#[tokio::test]
async fn test_e2e_short_payload_is_unknown() {
    let kernel = MockKernel::new();
    let (registry, mut rx) = capture_registry();
    let mut orchestrator =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();
    orchestrator.start().await.unwrap();

    let fixture = AlertFixture::hardware("ingress_vlan_filter", "l2_drops")
        .with_port(3, "swp3")
        .with_payload(0x0800, 64, vec![0xaa; 10]);
    assert!(kernel.inject_alert(&fixture));

    let msg = recv_msg(&mut rx).await;
    assert_eq!(msg.alert.origin, DropOrigin::Hardware);
    assert_eq!(msg.alert.drop_point(), "ingress_vlan_filter");
    assert_eq!(msg.alert.trap_group.as_deref(), Some("l2_drops"));
    assert_eq!(msg.alert.packet.captured_len, 10);
    assert_eq!(msg.alert.packet.original_len, 64);
    let summary = msg.packet.as_ref().expect("packet summary");
    assert_eq!(summary.packet_type(), PacketType::Unknown);
    assert!(summary.ethernet().is_none());

    orchestrator.shutdown().await.unwrap();
}

/// Alerts without payload carry no packet summary.
#[tokio::test]
async fn test_e2e_alert_without_payload() {
    let kernel = MockKernel::new();
    let (registry, mut rx) = capture_registry();
    let mut orchestrator =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();
    orchestrator.start().await.unwrap();

    assert!(kernel.inject_alert(&AlertFixture::software("kfree_skb").with_pc(0xffff_0001)));
    let msg = recv_msg(&mut rx).await;
    assert!(msg.packet.is_none());
    assert_eq!(msg.alert.pc, Some(0xffff_0001));

    orchestrator.shutdown().await.unwrap();
    assert_eq!(orchestrator.processor_stats().without_payload(), 1);
}

/// Alerts keep their kernel order at each exporter.
#[tokio::test]
async fn test_e2e_alerts_arrive_in_order() {
    let kernel = MockKernel::new();
    let (registry, mut rx) = capture_registry();
    let mut orchestrator =
        Orchestrator::build_with_exporters(test_config(), kernel.transport(), registry).unwrap();
    orchestrator.start().await.unwrap();

    for pc in 0..20u64 {
        let frame = udp_ipv6_frame([0xfe; 16], 53, [0xfd; 16], 5353);
        let fixture = AlertFixture::software("udp_queue_rcv_skb")
            .with_pc(pc)
            .with_payload(0x86dd, frame.len() as u32, frame);
        assert!(kernel.inject_alert(&fixture));
    }

    for expected in 0..20u64 {
        let msg = recv_msg(&mut rx).await;
        assert_eq!(msg.alert.pc, Some(expected));
        assert_eq!(
            msg.packet.as_ref().unwrap().packet_type(),
            PacketType::Transport
        );
    }

    let stats = orchestrator.processor_stats();
    wait_until(|| stats.processed() == 20).await;
    orchestrator.shutdown().await.unwrap();
}
