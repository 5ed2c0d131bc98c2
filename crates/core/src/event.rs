//! 이벤트 -- 커널 드롭 알림과 익스포터 전달 메시지
//!
//! ```text
//! kernel NET_DM ──PACKET_ALERT──▶ AlertEvent ──dissect──▶ WriteMsg ──Arc──▶ exporters
//! ```
//!
//! [`AlertEvent`]는 한 번 생성되면 변경되지 않으며, [`WriteMsg`]는 `Arc`로
//! 모든 익스포터에 공유됩니다.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::Serialize;

use crate::types::PacketSummary;

/// 드롭 발생 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DropOrigin {
    /// 커널 소프트웨어 경로에서 드롭
    Software,
    /// ASIC/하드웨어에서 드롭
    Hardware,
    /// 알 수 없음 (속성 누락 또는 미정의 값)
    Unknown,
}

impl DropOrigin {
    /// 커널 `NET_DM_ATTR_ORIGIN` 값을 변환합니다.
    pub fn from_raw(value: u16) -> Self {
        match value {
            0 => Self::Software,
            1 => Self::Hardware,
            _ => Self::Unknown,
        }
    }

    /// 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Software => "software",
            Self::Hardware => "hardware",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DropOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 패킷이 유입된 포트
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngressPort {
    /// 인터페이스 인덱스
    pub ifindex: Option<u32>,
    /// 인터페이스 이름
    pub name: Option<String>,
}

/// 드롭된 패킷 원본 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketDescriptor {
    /// L3 프로토콜 (EtherType)
    pub protocol: u16,
    /// 실제 수신한 페이로드 길이
    pub captured_len: u32,
    /// 절단 전 원래 길이
    pub original_len: u32,
    /// 캡처된 바이트 (절단되었을 수 있음)
    pub payload: Bytes,
}

impl PacketDescriptor {
    /// 페이로드로부터 디스크립터를 생성합니다. `captured_len`은 페이로드 길이입니다.
    pub fn new(protocol: u16, original_len: u32, payload: Bytes) -> Self {
        let captured_len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        Self {
            protocol,
            captured_len,
            original_len,
            payload,
        }
    }

    /// 페이로드가 없는 디스크립터
    pub fn empty() -> Self {
        Self::new(0, 0, Bytes::new())
    }

    /// 페이로드가 절단되었는지 확인합니다.
    pub fn is_truncated(&self) -> bool {
        self.original_len > self.captured_len
    }
}

/// 커널 드롭 알림 (`NET_DM_CMD_PACKET_ALERT` 한 건)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    /// 드롭 시각 (커널이 생략하면 수신 시각)
    pub timestamp: SystemTime,
    /// 드롭 발생 위치
    pub origin: DropOrigin,
    /// 하드웨어 트랩 이름
    pub trap_name: Option<String>,
    /// 하드웨어 트랩 그룹 이름
    pub trap_group: Option<String>,
    /// 유입 포트 (중첩 속성이 없으면 `None`)
    pub in_port: Option<IngressPort>,
    /// 소프트웨어 드롭 위치 심볼
    pub symbol: Option<String>,
    /// 소프트웨어 드롭 위치 PC
    pub pc: Option<u64>,
    /// 커널 드롭 사유
    pub reason: Option<String>,
    /// 패킷 원본
    pub packet: PacketDescriptor,
}

impl AlertEvent {
    /// 빈 알림을 생성합니다. 디코더가 속성을 채워 나갑니다.
    pub fn new(timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            origin: DropOrigin::Unknown,
            trap_name: None,
            trap_group: None,
            in_port: None,
            symbol: None,
            pc: None,
            reason: None,
            packet: PacketDescriptor::empty(),
        }
    }

    /// 드롭 지점 이름 (트랩 이름, 없으면 심볼)
    pub fn drop_point(&self) -> &str {
        self.trap_name
            .as_deref()
            .or(self.symbol.as_deref())
            .unwrap_or("unknown")
    }

    /// 유입 포트 이름
    pub fn port_name(&self) -> Option<&str> {
        self.in_port.as_ref().and_then(|p| p.name.as_deref())
    }

    /// 유입 포트 인덱스
    pub fn port_ifindex(&self) -> Option<u32> {
        self.in_port.as_ref().and_then(|p| p.ifindex)
    }

    /// Unix epoch 기준 경과 시간 (epoch 이전이면 0)
    pub fn since_epoch(&self) -> Duration {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "drop at {} ({}) origin={} len={}/{}",
            self.drop_point(),
            self.trap_group.as_deref().unwrap_or("-"),
            self.origin,
            self.packet.captured_len,
            self.packet.original_len,
        )
    }
}

/// 익스포터로 전달되는 메시지
///
/// 라우터가 `Arc<WriteMsg>`로 감싸 모든 익스포터에 공유합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMsg {
    /// 원본 알림
    pub alert: AlertEvent,
    /// 복원된 패킷 요약 (페이로드가 없으면 `None`)
    pub packet: Option<PacketSummary>,
}

impl WriteMsg {
    /// 새 메시지를 생성합니다.
    pub fn new(alert: AlertEvent, packet: Option<PacketSummary>) -> Self {
        Self { alert, packet }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_from_raw_maps_unknown_values() {
        assert_eq!(DropOrigin::from_raw(0), DropOrigin::Software);
        assert_eq!(DropOrigin::from_raw(1), DropOrigin::Hardware);
        assert_eq!(DropOrigin::from_raw(7), DropOrigin::Unknown);
        assert_eq!(DropOrigin::Hardware.to_string(), "hardware");
    }

    #[test]
    fn descriptor_captured_len_tracks_payload() {
        let desc = PacketDescriptor::new(0x0800, 1500, Bytes::from_static(&[0u8; 128]));
        assert_eq!(desc.captured_len, 128);
        assert!(desc.is_truncated());

        let empty = PacketDescriptor::empty();
        assert_eq!(empty.captured_len, 0);
        assert!(!empty.is_truncated());
    }

    #[test]
    fn drop_point_prefers_trap_name() {
        let mut alert = AlertEvent::new(UNIX_EPOCH);
        assert_eq!(alert.drop_point(), "unknown");

        alert.symbol = Some("kfree_skb_reason".to_owned());
        assert_eq!(alert.drop_point(), "kfree_skb_reason");

        alert.trap_name = Some("ttl_value_is_too_small".to_owned());
        assert_eq!(alert.drop_point(), "ttl_value_is_too_small");
    }

    #[test]
    fn port_accessors_handle_missing_port() {
        let mut alert = AlertEvent::new(UNIX_EPOCH);
        assert_eq!(alert.port_name(), None);
        assert_eq!(alert.port_ifindex(), None);

        alert.in_port = Some(IngressPort {
            ifindex: Some(3),
            name: None,
        });
        assert_eq!(alert.port_ifindex(), Some(3));
        assert_eq!(alert.port_name(), None);
    }

    #[test]
    fn since_epoch_is_zero_before_epoch() {
        let alert = AlertEvent::new(UNIX_EPOCH - Duration::from_secs(5));
        assert_eq!(alert.since_epoch(), Duration::ZERO);
    }
}
