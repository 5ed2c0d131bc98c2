#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`attr`]: netlink 속성(TLV) 디코더/인코더
//! - [`message`]: netlink / generic netlink 메시지 프레이밍
//! - [`family`]: generic netlink 컨트롤러 패밀리 조회
//! - [`alert`]: `PACKET_ALERT` 속성을 `AlertEvent`로 변환
//! - [`monitor`]: NET_DM 클라이언트 (설정 명령, 수신 루프)
//! - [`transport`]: 소켓 추상화 (`NetlinkTransport`)
//! - [`consts`]: 커널 프로토콜 상수
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! kernel ──NET_DM multicast──▶ NetlinkTransport ──▶ MessageIter ──▶ decode_alert
//!                                                                     │
//!                                           mpsc::Sender<AlertEvent> ◀┘
//! ```

pub mod alert;
pub mod attr;
pub mod consts;
pub mod error;
pub mod family;
pub mod message;
pub mod monitor;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// --- 주요 타입 re-export ---

// 클라이언트
pub use monitor::{AlertMode, DropMonitor, MonitorOptions, MonitorState, MonitorStats};

// 디코딩
pub use alert::decode_alert;
pub use attr::{AttrError, Attribute, AttributeDecoder, AttributeEncoder};

// 전송 계층
pub use transport::NetlinkTransport;
#[cfg(target_os = "linux")]
pub use transport::GenlSocket;

// 에러
pub use error::{DecodeError, DropmonError};
