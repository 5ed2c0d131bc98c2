//! 계층 체인 디코딩
//!
//! ```text
//! Ethernet ─▶ [802.1Q / 802.1ad]* ─▶ IPv4 | IPv6 [ext/AH...] ─▶ TCP | UDP ─▶ payload
//! ```
//!
//! 각 단계는 이전 단계가 다음 계층을 식별한 경우에만 실행됩니다.
//! 알 수 없는 다음 계층이나 부족한 데이터는 에러 없이 체인을 끝내고,
//! 헤더 값이 잘못된 경우에만 [`DissectError`]를 한 번 보고합니다.

use std::net::{Ipv4Addr, Ipv6Addr};

use dropwatch_core::types::{EthernetInfo, IpInfo, PacketSummary, TransportInfo};
use etherparse::err::{ipv4, ipv6, ipv6_exts, tcp};
use etherparse::{
    Ethernet2HeaderSlice, Ipv4HeaderSlice, Ipv6ExtensionSlice, Ipv6ExtensionsSlice, Ipv6HeaderSlice,
    SingleVlanHeaderSlice, TcpHeaderSlice, UdpHeaderSlice,
};

use crate::error::{DissectError, Layer};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_QINQ: u16 = 0x88a8;

pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;


/// 기본 최대 VLAN 태그 수 (QinQ)
pub const DEFAULT_MAX_VLAN_TAGS: usize = 2;

/// 디섹션 결과
///
/// 구조적 에러가 있어도 그 앞까지 디코딩된 계층은 `summary`에 남습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dissection {
    /// 패킷 요약
    pub summary: PacketSummary,
    /// 구조적 에러 (최대 1개)
    pub error: Option<DissectError>,
}

impl Dissection {
    pub fn is_malformed(&self) -> bool {
        self.error.is_some()
    }
}

/// 패킷 디섹터
///
/// 상태가 없으며 여러 스레드에서 공유할 수 있습니다.
#[derive(Debug, Clone)]
pub struct PacketDissector {
    max_vlan_tags: usize,
}

impl Default for PacketDissector {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketDissector {
    pub fn new() -> Self {
        Self {
            max_vlan_tags: DEFAULT_MAX_VLAN_TAGS,
        }
    }

    /// 해석할 최대 VLAN 태그 수를 지정합니다. 초과하는 태그가 있으면 L2에서 멈춥니다.
    pub fn with_max_vlan_tags(mut self, max: usize) -> Self {
        self.max_vlan_tags = max;
        self
    }

    /// 프레임을 디코딩합니다. 어떤 입력에도 패닉하지 않습니다.
    pub fn dissect(&self, frame: &[u8]) -> Dissection {
        let mut layers = Layers::default();
        let error = self.walk(frame, &mut layers).err();
        Dissection {
            summary: PacketSummary::from_layers(layers.ethernet, layers.ip, layers.transport),
            error,
        }
    }

    fn walk(&self, frame: &[u8], layers: &mut Layers) -> Result<(), DissectError> {
        let Some((ethernet, ether_type, l3_offset)) = self.ethernet(frame) else {
            return Ok(());
        };
        layers.ethernet = Some(ethernet);

        let l3 = &frame[l3_offset..];
        let next = match ether_type {
            ETHERTYPE_IPV4 => ipv4_layer(l3, l3_offset)?,
            ETHERTYPE_IPV6 => ipv6_layer(l3, l3_offset)?,
            _ => None,
        };
        let Some((ip, upper)) = next else {
            return Ok(());
        };
        layers.ip = Some(ip);

        let Some((protocol, l4_offset)) = upper else {
            return Ok(());
        };
        let l4_offset = l3_offset + l4_offset;
        layers.transport = transport_layer(protocol, &frame[l4_offset..], l4_offset)?;
        Ok(())
    }

    /// Ethernet II 헤더와 VLAN 태그. 반환: (정보, 최종 EtherType, L3 오프셋)
    fn ethernet(&self, frame: &[u8]) -> Option<(EthernetInfo, u16, usize)> {
        let header = Ethernet2HeaderSlice::from_slice(frame).ok()?;
        let mut info = EthernetInfo {
            src_mac: Some(format_mac(&header.source())),
            dst_mac: Some(format_mac(&header.destination())),
            ..Default::default()
        };
        let mut ether_type = header.ether_type().0;
        let mut offset = header.slice().len();

        let mut tags = 0;
        while matches!(ether_type, ETHERTYPE_VLAN | ETHERTYPE_QINQ) && tags < self.max_vlan_tags {
            let Ok(tag) = SingleVlanHeaderSlice::from_slice(&frame[offset..]) else {
                break;
            };
            info.vlan_id = Some(tag.vlan_identifier().value());
            info.pcp = Some(tag.priority_code_point().value());
            ether_type = tag.ether_type().0;
            offset += tag.slice().len();
            tags += 1;
        }

        info.ether_type = Some(ether_type);
        Some((info, ether_type, offset))
    }
}

#[derive(Default)]
struct Layers {
    ethernet: Option<EthernetInfo>,
    ip: Option<IpInfo>,
    transport: Option<TransportInfo>,
}

/// 상위 계층 (프로토콜 번호, L3 시작 기준 오프셋)
type Upper = Option<(u8, usize)>;

fn ipv4_layer(buf: &[u8], offset: usize) -> Result<Option<(IpInfo, Upper)>, DissectError> {
    let header = match Ipv4HeaderSlice::from_slice(buf) {
        Ok(header) => header,
        // 고정 헤더나 옵션이 잘림
        Err(ipv4::HeaderSliceError::Len(_)) => return Ok(None),
        Err(ipv4::HeaderSliceError::Content(e)) => {
            return Err(DissectError::malformed(Layer::Ipv4, offset, e));
        }
    };
    let header_len = header.slice().len();
    let total_len = usize::from(header.total_len());
    if total_len < header_len {
        return Err(DissectError::malformed(
            Layer::Ipv4,
            offset,
            format!("total length {total_len} smaller than header length {header_len}"),
        ));
    }

    let protocol = header.protocol().0;
    let info = IpInfo {
        src_ip: Some(Ipv4Addr::from(header.source_addr()).to_string()),
        dst_ip: Some(Ipv4Addr::from(header.destination_addr()).to_string()),
        protocol: Some(protocol),
        tos: Some((header.dcp().value() << 2) | header.ecn().value()),
        ttl: Some(header.ttl()),
    };

    // 첫 조각이 아니면 L4 헤더가 없음
    if header.fragments_offset().value() != 0 {
        return Ok(Some((info, None)));
    }
    Ok(Some((info, Some((protocol, header_len)))))
}

fn ipv6_layer(buf: &[u8], offset: usize) -> Result<Option<(IpInfo, Upper)>, DissectError> {
    let header = match Ipv6HeaderSlice::from_slice(buf) {
        Ok(header) => header,
        Err(ipv6::HeaderSliceError::Len(_)) => return Ok(None),
        Err(ipv6::HeaderSliceError::Content(e)) => {
            return Err(DissectError::malformed(Layer::Ipv6, offset, e));
        }
    };
    let header_len = header.slice().len();
    let mut info = IpInfo {
        src_ip: Some(Ipv6Addr::from(header.source_addr()).to_string()),
        dst_ip: Some(Ipv6Addr::from(header.destination_addr()).to_string()),
        protocol: Some(header.next_header().0),
        tos: Some(header.traffic_class()),
        ttl: Some(header.hop_limit()),
    };

    let upper = match Ipv6ExtensionsSlice::from_slice(header.next_header(), &buf[header_len..]) {
        Ok((exts, next, _)) => {
            let exts_len = exts.slice().len();
            // 첫 조각이 아니면 L4 헤더가 없음
            let later_fragment = exts.into_iter().any(|ext| match ext {
                Ipv6ExtensionSlice::Fragment(frag) => frag.fragment_offset().value() != 0,
                _ => false,
            });
            if later_fragment {
                None
            } else {
                info.protocol = Some(next.0);
                Some((next.0, header_len + exts_len))
            }
        }
        // 확장 헤더가 잘림
        Err(ipv6_exts::HeaderSliceError::Len(_)) => None,
        Err(ipv6_exts::HeaderSliceError::Content(e)) => {
            return Err(DissectError::malformed(Layer::Ipv6, offset + header_len, e));
        }
    };
    Ok(Some((info, upper)))
}

fn transport_layer(
    protocol: u8,
    buf: &[u8],
    offset: usize,
) -> Result<Option<TransportInfo>, DissectError> {
    match protocol {
        IP_PROTO_TCP => {
            let header = match TcpHeaderSlice::from_slice(buf) {
                Ok(header) => header,
                Err(tcp::HeaderSliceError::Len(_)) => return Ok(None),
                Err(tcp::HeaderSliceError::Content(e)) => {
                    return Err(DissectError::malformed(Layer::Tcp, offset, e));
                }
            };
            Ok(Some(TransportInfo {
                src_port: Some(header.source_port()),
                dst_port: Some(header.destination_port()),
            }))
        }
        IP_PROTO_UDP => {
            let Ok(header) = UdpHeaderSlice::from_slice(buf) else {
                return Ok(None);
            };
            if header.length() < 8 {
                return Err(DissectError::malformed(
                    Layer::Udp,
                    offset,
                    format!("length field {} smaller than header", header.length()),
                ));
            }
            Ok(Some(TransportInfo {
                src_port: Some(header.source_port()),
                dst_port: Some(header.destination_port()),
            }))
        }
        _ => Ok(None),
    }
}

fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// 기본 설정으로 프레임을 디코딩합니다.
pub fn dissect(frame: &[u8]) -> Dissection {
    PacketDissector::new().dissect(frame)
}
