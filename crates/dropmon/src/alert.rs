//! `NET_DM_CMD_PACKET_ALERT` 디코딩
//!
//! 속성 스트림을 [`AlertEvent`]로 변환합니다. 알 수 없는 속성은 건너뛰며,
//! 알려진 속성의 값이 잘못되면 메시지 전체가 실패합니다.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use dropwatch_core::event::{AlertEvent, DropOrigin, IngressPort, PacketDescriptor};

use crate::attr::{Attribute, AttributeDecoder};
use crate::consts::{
    NET_DM_ATTR_HW_TRAP_GROUP_NAME, NET_DM_ATTR_HW_TRAP_NAME, NET_DM_ATTR_IN_PORT,
    NET_DM_ATTR_ORIG_LEN, NET_DM_ATTR_ORIGIN, NET_DM_ATTR_PAYLOAD, NET_DM_ATTR_PC,
    NET_DM_ATTR_PORT_NETDEV_IFINDEX, NET_DM_ATTR_PORT_NETDEV_NAME, NET_DM_ATTR_PROTO,
    NET_DM_ATTR_REASON, NET_DM_ATTR_SYMBOL, NET_DM_ATTR_TIMESTAMP,
};
use crate::error::DecodeError;

/// 알림 속성 스트림을 디코딩합니다.
///
/// 커널이 타임스탬프를 생략하면 `received_at`을 사용합니다.
pub fn decode_alert(attrs: &[u8], received_at: SystemTime) -> Result<AlertEvent, DecodeError> {
    let mut alert = AlertEvent::new(received_at);
    let mut protocol = 0u16;
    let mut original_len = 0u32;
    let mut payload = Bytes::new();

    for attr in AttributeDecoder::new(attrs) {
        let attr = attr?;
        match attr.kind() {
            NET_DM_ATTR_HW_TRAP_GROUP_NAME => alert.trap_group = Some(attr.string()),
            NET_DM_ATTR_HW_TRAP_NAME => alert.trap_name = Some(attr.string()),
            NET_DM_ATTR_ORIGIN => alert.origin = DropOrigin::from_raw(attr.u16()?),
            NET_DM_ATTR_IN_PORT => alert.in_port = Some(decode_port(&attr)?),
            NET_DM_ATTR_TIMESTAMP => {
                alert.timestamp = UNIX_EPOCH + Duration::from_nanos(attr.u64()?);
            }
            NET_DM_ATTR_PROTO => protocol = attr.u16()?,
            NET_DM_ATTR_ORIG_LEN => original_len = attr.u32()?,
            NET_DM_ATTR_PAYLOAD => payload = Bytes::copy_from_slice(attr.bytes()),
            NET_DM_ATTR_PC => alert.pc = Some(attr.u64()?),
            NET_DM_ATTR_SYMBOL => alert.symbol = Some(attr.string()),
            NET_DM_ATTR_REASON => alert.reason = Some(attr.string()),
            _ => {}
        }
    }

    alert.packet = PacketDescriptor::new(protocol, original_len, payload);
    Ok(alert)
}

fn decode_port(attr: &Attribute<'_>) -> Result<IngressPort, DecodeError> {
    let mut port = IngressPort::default();
    for field in attr.nested() {
        let field = field?;
        match field.kind() {
            NET_DM_ATTR_PORT_NETDEV_IFINDEX => port.ifindex = Some(field.u32()?),
            NET_DM_ATTR_PORT_NETDEV_NAME => port.name = Some(field.string()),
            _ => {}
        }
    }
    Ok(port)
}
