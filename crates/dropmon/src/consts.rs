//! 프로토콜 상수 -- netlink, generic netlink 컨트롤러, NET_DM
//!
//! 값은 커널 UAPI 헤더(`linux/netlink.h`, `linux/genetlink.h`,
//! `linux/net_dropmon.h`)와 일치해야 합니다.

// ─── netlink ──────────────────────────────────────────────────────

/// 요청 메시지
pub const NLM_F_REQUEST: u16 = 0x1;
/// 멀티파트 메시지
pub const NLM_F_MULTI: u16 = 0x2;
/// ACK 요청
pub const NLM_F_ACK: u16 = 0x4;

/// 에러/ACK 메시지 타입
pub const NLMSG_ERROR: u16 = 0x2;
/// 멀티파트 종료 메시지 타입
pub const NLMSG_DONE: u16 = 0x3;

/// netlink 메시지 헤더 길이
pub const NLMSG_HDRLEN: usize = 16;
/// generic netlink 헤더 길이
pub const GENL_HDRLEN: usize = 4;
/// netlink 정렬 단위
pub const NLA_ALIGNTO: usize = 4;

/// 4바이트 경계로 정렬합니다.
pub const fn nl_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

// ─── errno ────────────────────────────────────────────────────────

/// 패밀리/오브젝트 없음
pub const ENOENT: i32 = 2;
/// 소켓 수신 버퍼 오버런
pub const ENOBUFS: i32 = 105;

// ─── generic netlink 컨트롤러 ─────────────────────────────────────

/// 컨트롤러 패밀리 ID
pub const GENL_ID_CTRL: u16 = 0x10;
/// 패밀리 조회 명령
pub const CTRL_CMD_GETFAMILY: u8 = 3;
/// 컨트롤러 프로토콜 버전
pub const CTRL_VERSION: u8 = 1;

pub const CTRL_ATTR_FAMILY_ID: u16 = 1;
pub const CTRL_ATTR_FAMILY_NAME: u16 = 2;
pub const CTRL_ATTR_VERSION: u16 = 3;
pub const CTRL_ATTR_MCAST_GROUPS: u16 = 7;

pub const CTRL_ATTR_MCAST_GRP_NAME: u16 = 1;
pub const CTRL_ATTR_MCAST_GRP_ID: u16 = 2;

// ─── NET_DM ───────────────────────────────────────────────────────

/// drop monitor 패밀리 이름
pub const NET_DM_FAMILY_NAME: &str = "NET_DM";
/// drop monitor 멀티캐스트 그룹 이름
pub const NET_DM_GRP_NAME: &str = "events";
/// drop monitor 알림 멀티캐스트 그룹 (커널이 1로 고정)
pub const NET_DM_GRP_ALERT: u32 = 1;

pub const NET_DM_CMD_UNSPEC: u8 = 0;
pub const NET_DM_CMD_ALERT: u8 = 1;
pub const NET_DM_CMD_CONFIG: u8 = 2;
pub const NET_DM_CMD_START: u8 = 3;
pub const NET_DM_CMD_STOP: u8 = 4;
pub const NET_DM_CMD_PACKET_ALERT: u8 = 5;
pub const NET_DM_CMD_CONFIG_GET: u8 = 6;
pub const NET_DM_CMD_CONFIG_NEW: u8 = 7;
pub const NET_DM_CMD_STATS_GET: u8 = 8;
pub const NET_DM_CMD_STATS_NEW: u8 = 9;

pub const NET_DM_ATTR_UNSPEC: u16 = 0;
pub const NET_DM_ATTR_ALERT_MODE: u16 = 1; // u8
pub const NET_DM_ATTR_PC: u16 = 2; // u64
pub const NET_DM_ATTR_SYMBOL: u16 = 3; // string
pub const NET_DM_ATTR_IN_PORT: u16 = 4; // nested
pub const NET_DM_ATTR_TIMESTAMP: u16 = 5; // u64
pub const NET_DM_ATTR_PROTO: u16 = 6; // u16
pub const NET_DM_ATTR_PAYLOAD: u16 = 7; // binary
pub const NET_DM_ATTR_PAD: u16 = 8;
pub const NET_DM_ATTR_TRUNC_LEN: u16 = 9; // u32
pub const NET_DM_ATTR_ORIG_LEN: u16 = 10; // u32
pub const NET_DM_ATTR_QUEUE_LEN: u16 = 11; // u32
pub const NET_DM_ATTR_STATS: u16 = 12; // nested
pub const NET_DM_ATTR_HW_STATS: u16 = 13; // nested
pub const NET_DM_ATTR_ORIGIN: u16 = 14; // u16
pub const NET_DM_ATTR_HW_TRAP_GROUP_NAME: u16 = 15; // string
pub const NET_DM_ATTR_HW_TRAP_NAME: u16 = 16; // string
pub const NET_DM_ATTR_HW_ENTRIES: u16 = 17; // nested
pub const NET_DM_ATTR_HW_ENTRY: u16 = 18; // nested
pub const NET_DM_ATTR_HW_TRAP_COUNT: u16 = 19; // u32
pub const NET_DM_ATTR_SW_DROPS: u16 = 20; // flag
pub const NET_DM_ATTR_HW_DROPS: u16 = 21; // flag
pub const NET_DM_ATTR_FLOW_ACTION_COOKIE: u16 = 22; // binary
pub const NET_DM_ATTR_REASON: u16 = 23; // string

pub const NET_DM_ATTR_PORT_NETDEV_IFINDEX: u16 = 0; // u32
pub const NET_DM_ATTR_PORT_NETDEV_NAME: u16 = 1; // string

pub const NET_DM_ALERT_MODE_SUMMARY: u8 = 0;
pub const NET_DM_ALERT_MODE_PACKET: u8 = 1;

pub const NET_DM_ORIGIN_SW: u16 = 0;
pub const NET_DM_ORIGIN_HW: u16 = 1;

/// 명령 이름 (로그/에러 메시지용)
pub fn command_name(cmd: u8) -> &'static str {
    match cmd {
        NET_DM_CMD_ALERT => "ALERT",
        NET_DM_CMD_CONFIG => "CONFIG",
        NET_DM_CMD_START => "START",
        NET_DM_CMD_STOP => "STOP",
        NET_DM_CMD_PACKET_ALERT => "PACKET_ALERT",
        NET_DM_CMD_CONFIG_GET => "CONFIG_GET",
        NET_DM_CMD_CONFIG_NEW => "CONFIG_NEW",
        NET_DM_CMD_STATS_GET => "STATS_GET",
        NET_DM_CMD_STATS_NEW => "STATS_NEW",
        _ => "UNSPEC",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up_to_four() {
        assert_eq!(nl_align(0), 0);
        assert_eq!(nl_align(1), 4);
        assert_eq!(nl_align(4), 4);
        assert_eq!(nl_align(5), 8);
        assert_eq!(nl_align(NLMSG_HDRLEN + GENL_HDRLEN), 20);
    }

    #[test]
    fn command_names() {
        assert_eq!(command_name(NET_DM_CMD_START), "START");
        assert_eq!(command_name(NET_DM_CMD_UNSPEC), "UNSPEC");
        assert_eq!(command_name(200), "UNSPEC");
    }
}
