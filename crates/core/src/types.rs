//! 도메인 타입 -- 패킷 요약 정보
//!
//! 드롭된 패킷 페이로드에서 복원한 L2~L4 헤더 요약을 정의합니다.
//! 모든 필드는 `Option`이며, 복원하지 못한 값은 JSON 직렬화에서 생략됩니다.
//!
//! ```text
//! {"packetType":"Transport",
//!  "ETHERNET":{"srcMac":"..","dstMac":"..","etherType":2048},
//!  "IP":{"srcIp":"..","dstIp":"..","protocol":6,"tos":0,"ttl":64},
//!  "Transport":{"srcPort":443,"dstPort":51000}}
//! ```

use std::fmt;

use serde::Serialize;

/// 패킷 분류 태그
///
/// 디코딩에 성공한 가장 깊은 계층을 나타냅니다.
/// 우선순위: `Transport` > `Ip` > `Ethernet` > `Unknown`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PacketType {
    /// 아무 계층도 디코딩하지 못함
    Unknown,
    /// L2까지 디코딩
    Ethernet,
    /// L3까지 디코딩
    #[serde(rename = "IP")]
    Ip,
    /// L4까지 디코딩
    Transport,
}

impl PacketType {
    /// 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Ethernet => "Ethernet",
            Self::Ip => "IP",
            Self::Transport => "Transport",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// L2 (Ethernet / 802.1Q) 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthernetInfo {
    /// 출발지 MAC (`aa:bb:cc:dd:ee:ff`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_mac: Option<String>,
    /// 목적지 MAC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_mac: Option<String>,
    /// EtherType (VLAN 태그가 있으면 가장 안쪽 값)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ether_type: Option<u16>,
    /// VLAN 우선순위 (PCP)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pcp: Option<u8>,
    /// VLAN ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
}

/// L3 (IPv4 / IPv6) 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpInfo {
    /// 출발지 주소
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<String>,
    /// 목적지 주소
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_ip: Option<String>,
    /// 상위 프로토콜 번호 (IPv6는 확장 헤더를 건너뛴 최종 next header)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<u8>,
    /// TOS / traffic class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tos: Option<u8>,
    /// TTL / hop limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u8>,
}

/// L4 (TCP / UDP) 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportInfo {
    /// 출발지 포트
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
    /// 목적지 포트
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
}

/// 패킷 요약
///
/// 분류 태그는 존재하는 하위 레코드로부터 계산되므로
/// 생성자 [`PacketSummary::from_layers`]를 통해서만 만들 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketSummary {
    #[serde(rename = "packetType")]
    packet_type: PacketType,
    #[serde(rename = "ETHERNET", skip_serializing_if = "Option::is_none")]
    ethernet: Option<EthernetInfo>,
    #[serde(rename = "IP", skip_serializing_if = "Option::is_none")]
    ip: Option<IpInfo>,
    #[serde(rename = "Transport", skip_serializing_if = "Option::is_none")]
    transport: Option<TransportInfo>,
}

impl PacketSummary {
    /// 디코딩된 계층들로 요약을 생성하고 분류 태그를 계산합니다.
    pub fn from_layers(
        ethernet: Option<EthernetInfo>,
        ip: Option<IpInfo>,
        transport: Option<TransportInfo>,
    ) -> Self {
        let packet_type = if transport.is_some() {
            PacketType::Transport
        } else if ip.is_some() {
            PacketType::Ip
        } else if ethernet.is_some() {
            PacketType::Ethernet
        } else {
            PacketType::Unknown
        };

        Self {
            packet_type,
            ethernet,
            ip,
            transport,
        }
    }

    /// 아무 계층도 없는 요약을 생성합니다.
    pub fn unknown() -> Self {
        Self::from_layers(None, None, None)
    }

    /// 분류 태그
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// L2 정보
    pub fn ethernet(&self) -> Option<&EthernetInfo> {
        self.ethernet.as_ref()
    }

    /// L3 정보
    pub fn ip(&self) -> Option<&IpInfo> {
        self.ip.as_ref()
    }

    /// L4 정보
    pub fn transport(&self) -> Option<&TransportInfo> {
        self.transport.as_ref()
    }
}

impl fmt::Display for PacketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.packet_type)?;
        if let Some(ip) = &self.ip {
            write!(
                f,
                " {} -> {}",
                ip.src_ip.as_deref().unwrap_or("?"),
                ip.dst_ip.as_deref().unwrap_or("?"),
            )?;
        }
        if let Some(transport) = &self.transport {
            write!(
                f,
                " ports {}->{}",
                transport.src_port.unwrap_or_default(),
                transport.dst_port.unwrap_or_default(),
            )?;
        }
        Ok(())
    }
}
