//! drop monitor 에러 타입
//!
//! [`DropmonError`]는 커널과의 통신 중 발생하는 모든 에러를 표현합니다.
//! `From<DropmonError> for DropwatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use dropwatch_core::error::{DropwatchError, NetlinkError, ParseError};

use crate::attr::AttrError;
use crate::monitor::MonitorState;

/// drop monitor 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum DropmonError {
    /// 커널이 NET_DM 패밀리를 제공하지 않음 (모듈 미로드 등)
    #[error("generic netlink family '{0}' is not available")]
    FamilyUnavailable(String),

    /// 소켓 생성, 송수신 실패
    #[error("netlink connection error: {0}")]
    Connection(String),

    /// 멀티캐스트 그룹 가입 실패
    #[error("failed to join multicast group {group}: {reason}")]
    Subscription {
        /// 그룹 ID
        group: u32,
        /// 실패 사유
        reason: String,
    },

    /// 커널이 명령을 거부함
    #[error("command {command} rejected by kernel (errno {errno})")]
    Command {
        /// 명령 이름
        command: &'static str,
        /// 양수 errno
        errno: i32,
    },

    /// 응답 대기 시간 초과
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// 현재 상태에서 허용되지 않는 동작
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// 시도한 동작
        operation: &'static str,
        /// 현재 상태
        state: MonitorState,
    },

    /// 메시지 디코딩 실패
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// netlink 메시지/속성 디코딩 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// 속성 스트림 구조 오류 또는 값 길이 불일치
    #[error(transparent)]
    Attribute(#[from] AttrError),

    /// 헤더를 읽기에 데이터가 부족함
    #[error("truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        /// 헤더 종류
        what: &'static str,
        /// 필요한 바이트 수
        needed: usize,
        /// 남은 바이트 수
        available: usize,
    },

    /// nlmsg_len이 헤더보다 작거나 버퍼를 넘어섬
    #[error("invalid netlink message length {len} at offset {offset}")]
    InvalidLength {
        /// 메시지 시작 오프셋
        offset: usize,
        /// 선언된 길이
        len: usize,
    },

    /// 필수 속성 누락
    #[error("missing attribute {0}")]
    MissingAttribute(&'static str),
}

impl From<std::io::Error> for DropmonError {
    fn from(err: std::io::Error) -> Self {
        DropmonError::Connection(err.to_string())
    }
}

impl From<DropmonError> for DropwatchError {
    fn from(err: DropmonError) -> Self {
        match err {
            DropmonError::FamilyUnavailable(name) => {
                DropwatchError::Netlink(NetlinkError::FamilyUnavailable(name))
            }
            DropmonError::Connection(reason) => {
                DropwatchError::Netlink(NetlinkError::Connection(reason))
            }
            DropmonError::Timeout(what) => DropwatchError::Netlink(NetlinkError::Connection(
                format!("timed out waiting for {what}"),
            )),
            DropmonError::Subscription { group, reason } => DropwatchError::Netlink(
                NetlinkError::Subscription(format!("group {group}: {reason}")),
            ),
            DropmonError::Command { command, errno } => {
                DropwatchError::Netlink(NetlinkError::Command {
                    command: command.to_owned(),
                    errno,
                })
            }
            e @ DropmonError::InvalidState { .. } => {
                DropwatchError::Netlink(NetlinkError::InvalidState(e.to_string()))
            }
            DropmonError::Decode(e) => DropwatchError::Parse(ParseError::Failed {
                offset: 0,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_unavailable_maps_to_netlink_error() {
        let err: DropwatchError = DropmonError::FamilyUnavailable("NET_DM".to_owned()).into();
        assert!(matches!(
            err,
            DropwatchError::Netlink(NetlinkError::FamilyUnavailable(_))
        ));
    }

    #[test]
    fn decode_error_maps_to_parse_error() {
        let err: DropwatchError = DropmonError::Decode(DecodeError::MissingAttribute(
            "CTRL_ATTR_FAMILY_ID",
        ))
        .into();
        assert!(matches!(err, DropwatchError::Parse(_)));
        assert!(err.to_string().contains("CTRL_ATTR_FAMILY_ID"));
    }

    #[test]
    fn invalid_state_message_names_operation() {
        let err = DropmonError::InvalidState {
            operation: "start",
            state: MonitorState::Closed,
        };
        assert_eq!(err.to_string(), "cannot start while closed");
    }
}
