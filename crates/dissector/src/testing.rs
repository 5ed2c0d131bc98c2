//! 테스트 프레임 생성기
//!
//! 체크섬은 계산하지 않습니다 (디섹터는 검증하지 않음).

use crate::dissect::{ETHERTYPE_IPV4, ETHERTYPE_IPV6, IP_PROTO_TCP, IP_PROTO_UDP};

/// 테스트 프레임 출발지 MAC
pub const SRC_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
/// 테스트 프레임 목적지 MAC
pub const DST_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

/// Ethernet II 프레임
pub fn ethernet_frame(ether_type: u16, payload: &[u8]) -> Vec<u8> {
    vlan_frame(&[], ether_type, payload)
}

/// VLAN 태그가 붙은 Ethernet 프레임. 태그는 `(tpid, pcp, vlan_id)` 순서.
pub fn vlan_frame(tags: &[(u16, u8, u16)], ether_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(14 + tags.len() * 4 + payload.len());
    frame.extend_from_slice(&DST_MAC);
    frame.extend_from_slice(&SRC_MAC);
    for &(tpid, pcp, vlan_id) in tags {
        frame.extend_from_slice(&tpid.to_be_bytes());
        let tci = (u16::from(pcp & 0x07) << 13) | (vlan_id & 0x0fff);
        frame.extend_from_slice(&tci.to_be_bytes());
    }
    frame.extend_from_slice(&ether_type.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// IPv4 패킷 (옵션 없음, TOS 0x10, TTL 64)
pub fn ipv4_packet(protocol: u8, src: [u8; 4], dst: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let total_len = u16::try_from(20 + payload.len()).unwrap_or(u16::MAX);
    let mut packet = Vec::with_capacity(20 + payload.len());
    packet.push(0x45);
    packet.push(0x10);
    packet.extend_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&[0x12, 0x34]); // identification
    packet.extend_from_slice(&[0x40, 0x00]); // DF
    packet.push(64);
    packet.push(protocol);
    packet.extend_from_slice(&[0, 0]);
    packet.extend_from_slice(&src);
    packet.extend_from_slice(&dst);
    packet.extend_from_slice(payload);
    packet
}

/// IPv6 패킷 (traffic class 0, hop limit 64)
pub fn ipv6_packet(next_header: u8, src: [u8; 16], dst: [u8; 16], payload: &[u8]) -> Vec<u8> {
    let payload_len = u16::try_from(payload.len()).unwrap_or(u16::MAX);
    let mut packet = Vec::with_capacity(40 + payload.len());
    packet.extend_from_slice(&[0x60, 0x00, 0x00, 0x00]);
    packet.extend_from_slice(&payload_len.to_be_bytes());
    packet.push(next_header);
    packet.push(64);
    packet.extend_from_slice(&src);
    packet.extend_from_slice(&dst);
    packet.extend_from_slice(payload);
    packet
}

/// TCP 헤더 (옵션 없음, SYN)
pub fn tcp_segment(src_port: u16, dst_port: u16) -> Vec<u8> {
    let mut segment = Vec::with_capacity(20);
    segment.extend_from_slice(&src_port.to_be_bytes());
    segment.extend_from_slice(&dst_port.to_be_bytes());
    segment.extend_from_slice(&1u32.to_be_bytes()); // seq
    segment.extend_from_slice(&0u32.to_be_bytes()); // ack
    segment.push(5 << 4);
    segment.push(0x02);
    segment.extend_from_slice(&64240u16.to_be_bytes());
    segment.extend_from_slice(&[0, 0, 0, 0]);
    segment
}

/// UDP 데이터그램
pub fn udp_datagram(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let len = u16::try_from(8 + payload.len()).unwrap_or(u16::MAX);
    let mut datagram = Vec::with_capacity(8 + payload.len());
    datagram.extend_from_slice(&src_port.to_be_bytes());
    datagram.extend_from_slice(&dst_port.to_be_bytes());
    datagram.extend_from_slice(&len.to_be_bytes());
    datagram.extend_from_slice(&[0, 0]);
    datagram.extend_from_slice(payload);
    datagram
}

/// Ethernet/IPv4/TCP 프레임
pub fn tcp_ipv4_frame(src: [u8; 4], src_port: u16, dst: [u8; 4], dst_port: u16) -> Vec<u8> {
    let segment = tcp_segment(src_port, dst_port);
    ethernet_frame(ETHERTYPE_IPV4, &ipv4_packet(IP_PROTO_TCP, src, dst, &segment))
}

/// Ethernet/IPv4/UDP 프레임
pub fn udp_ipv4_frame(src: [u8; 4], src_port: u16, dst: [u8; 4], dst_port: u16) -> Vec<u8> {
    let datagram = udp_datagram(src_port, dst_port, b"payload");
    ethernet_frame(ETHERTYPE_IPV4, &ipv4_packet(IP_PROTO_UDP, src, dst, &datagram))
}

/// Ethernet/IPv6/UDP 프레임
pub fn udp_ipv6_frame(src: [u8; 16], src_port: u16, dst: [u8; 16], dst_port: u16) -> Vec<u8> {
    let datagram = udp_datagram(src_port, dst_port, b"payload");
    ethernet_frame(ETHERTYPE_IPV6, &ipv6_packet(IP_PROTO_UDP, src, dst, &datagram))
}
