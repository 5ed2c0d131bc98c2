//! netlink 전송 계층 추상화
//!
//! [`NetlinkTransport`]는 데이터그램 송수신과 멀티캐스트 그룹 가입만 담당합니다.
//! 실제 커널 소켓은 [`GenlSocket`](Linux 전용), 테스트에서는
//! `testing::MockTransport`를 사용합니다.

use std::future::Future;
use std::io;

use crate::consts::ENOBUFS;

/// netlink 데이터그램 전송 trait
///
/// `recv`는 `tokio::select!` 안에서 취소될 수 있어야 합니다
/// (취소 시 이미 수신한 데이터그램을 잃지 않아야 함).
pub trait NetlinkTransport: Send + 'static {
    /// 커널로 데이터그램을 보냅니다.
    fn send(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// 다음 데이터그램을 받습니다.
    fn recv(&mut self) -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    /// 멀티캐스트 그룹에 가입합니다.
    fn add_membership(&mut self, group: u32) -> io::Result<()>;

    /// 멀티캐스트 그룹에서 탈퇴합니다.
    fn drop_membership(&mut self, group: u32) -> io::Result<()>;
}

/// 커널이 소켓 수신 버퍼 오버런을 알린 경우인지 확인합니다.
///
/// 오버런 이후에도 소켓은 계속 사용할 수 있으며, 그 사이의 알림만 유실됩니다.
pub fn is_overrun(err: &io::Error) -> bool {
    err.raw_os_error() == Some(ENOBUFS)
}

#[cfg(target_os = "linux")]
pub use linux::GenlSocket;

#[cfg(target_os = "linux")]
mod linux {
    use std::io;

    use netlink_sys::protocols::NETLINK_GENERIC;
    use netlink_sys::{AsyncSocket, AsyncSocketExt, SocketAddr, TokioSocket};

    use super::NetlinkTransport;

    /// `NETLINK_GENERIC` 소켓
    pub struct GenlSocket {
        socket: TokioSocket,
    }

    impl GenlSocket {
        /// 소켓을 열고 커널이 할당한 포트 ID로 바인드합니다.
        pub fn open() -> io::Result<Self> {
            let mut socket = TokioSocket::new(NETLINK_GENERIC)?;
            let addr = socket.socket_mut().bind_auto()?;
            tracing::debug!(port_id = addr.port_number(), "generic netlink socket bound");
            Ok(Self { socket })
        }
    }

    impl NetlinkTransport for GenlSocket {
        async fn send(&mut self, buf: &[u8]) -> io::Result<()> {
            let kernel = SocketAddr::new(0, 0);
            self.socket.send_to(buf, &kernel).await.map(|_| ())
        }

        async fn recv(&mut self) -> io::Result<Vec<u8>> {
            let (buf, _from) = self.socket.recv_from_full().await?;
            Ok(buf)
        }

        fn add_membership(&mut self, group: u32) -> io::Result<()> {
            self.socket.socket_mut().add_membership(group)
        }

        fn drop_membership(&mut self, group: u32) -> io::Result<()> {
            self.socket.socket_mut().drop_membership(group)
        }
    }
}
