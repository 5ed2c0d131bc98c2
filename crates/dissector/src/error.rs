//! 디섹터 에러 타입

use std::fmt;

use dropwatch_core::error::{DropwatchError, ParseError};

/// 디코딩 계층
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Ethernet,
    Vlan,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethernet => "ethernet",
            Self::Vlan => "vlan",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 구조적 디코딩 에러
///
/// 데이터 부족은 에러가 아니라 체인 종료로 처리되므로, 이 에러는 헤더 값 자체가
/// 잘못된 경우(버전, 길이 필드 등)에만 발생합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DissectError {
    /// 헤더 필드가 잘못됨
    #[error("malformed {layer} header at offset {offset}: {reason}")]
    Malformed {
        /// 실패한 계층
        layer: Layer,
        /// 프레임 내 헤더 시작 오프셋
        offset: usize,
        /// 사유
        reason: String,
    },
}

impl DissectError {
    pub(crate) fn malformed(layer: Layer, offset: usize, reason: impl fmt::Display) -> Self {
        Self::Malformed {
            layer,
            offset,
            reason: reason.to_string(),
        }
    }

    /// 실패한 계층
    pub fn layer(&self) -> Layer {
        match self {
            Self::Malformed { layer, .. } => *layer,
        }
    }
}

impl From<DissectError> for DropwatchError {
    fn from(err: DissectError) -> Self {
        let DissectError::Malformed { offset, .. } = &err;
        DropwatchError::Parse(ParseError::Failed {
            offset: *offset,
            reason: err.to_string(),
        })
    }
}
