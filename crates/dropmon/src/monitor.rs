//! drop monitor 클라이언트 -- NET_DM 패밀리 조회, 설정 명령, 알림 수신 루프
//!
//! # 상태 전이
//! ```text
//! Uninitialized ──init()──▶ Ready ──start()──▶ Receiving
//!                             ▲                    │
//!                             └──────stop()────────┘
//! (모든 상태) ──close()──▶ Closed
//! ```
//!
//! 설정 명령(`configure`, `enable_monitoring`, `disable_monitoring`)은 `Ready`
//! 상태에서만 보낼 수 있습니다. 수신 중에는 소켓을 수신 태스크가 소유합니다.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use dropwatch_core::event::AlertEvent;
use dropwatch_core::metrics as m;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alert::decode_alert;
use crate::attr::AttributeEncoder;
use crate::consts::{
    ENOENT, NET_DM_ALERT_MODE_PACKET, NET_DM_ALERT_MODE_SUMMARY, NET_DM_ATTR_ALERT_MODE,
    NET_DM_ATTR_HW_DROPS, NET_DM_ATTR_SW_DROPS, NET_DM_ATTR_TRUNC_LEN, NET_DM_CMD_CONFIG,
    NET_DM_CMD_PACKET_ALERT, NET_DM_CMD_START, NET_DM_CMD_STOP, NET_DM_FAMILY_NAME,
    NET_DM_GRP_ALERT, NET_DM_GRP_NAME, NLM_F_ACK, NLM_F_REQUEST, command_name,
};
use crate::error::DropmonError;
use crate::family::{FamilyInfo, encode_get_family, parse_family};
use crate::message::{GenlHeader, MessageIter, NetlinkMessage, encode_genl};
use crate::transport::{NetlinkTransport, is_overrun};

/// 알림 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertMode {
    /// 드롭 위치 요약만 전달 (`NET_DM_CMD_ALERT`)
    Summary,
    /// 패킷 단위 알림 (`NET_DM_CMD_PACKET_ALERT`)
    Packet,
}

impl AlertMode {
    /// 설정 문자열("packet", "summary")을 해석합니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "packet" => Some(Self::Packet),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }

    /// 커널에 보내는 값
    pub fn as_raw(self) -> u8 {
        match self {
            Self::Summary => NET_DM_ALERT_MODE_SUMMARY,
            Self::Packet => NET_DM_ALERT_MODE_PACKET,
        }
    }
}

impl fmt::Display for AlertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summary => f.write_str("summary"),
            Self::Packet => f.write_str("packet"),
        }
    }
}

/// 클라이언트 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// 패밀리 미조회
    Uninitialized,
    /// 명령 전송 가능
    Ready,
    /// 수신 루프 실행 중
    Receiving,
    /// 소켓 해제됨 (종료 상태)
    Closed,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Receiving => "receiving",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// 클라이언트 타이밍 설정
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// 명령 ACK 대기 시간
    pub ack_timeout: Duration,
    /// `stop()`이 수신 태스크 종료를 기다리는 최대 시간
    pub stop_timeout: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// 수신 루프 카운터
///
/// 수신 태스크와 클라이언트가 공유합니다.
#[derive(Debug, Default)]
pub struct MonitorStats {
    alerts_received: AtomicU64,
    decode_errors: AtomicU64,
    overruns: AtomicU64,
}

impl MonitorStats {
    /// 디코딩에 성공한 알림 수
    pub fn alerts_received(&self) -> u64 {
        self.alerts_received.load(Ordering::Relaxed)
    }

    /// 디코딩에 실패해 버린 메시지 수
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// 소켓 수신 버퍼 오버런 횟수
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    fn record_alert(&self, alert: &AlertEvent) {
        self.alerts_received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::MONITOR_ALERTS_RECEIVED_TOTAL, m::LABEL_ORIGIN => alert.origin.as_str())
            .increment(1);
    }

    fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::MONITOR_DECODE_ERRORS_TOTAL).increment(1);
    }

    fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::MONITOR_SOCKET_OVERRUNS_TOTAL).increment(1);
    }
}

struct Receiver<T> {
    cancel: CancellationToken,
    task: JoinHandle<T>,
}

/// NET_DM 클라이언트
///
/// # 사용 예시
/// ```ignore
/// let mut monitor = DropMonitor::connect().await?;
/// monitor.configure(AlertMode::Packet, None).await?;
/// monitor.enable_monitoring(true, true).await?;
///
/// let (tx, mut rx) = tokio::sync::mpsc::channel(1024);
/// monitor.start(tx)?;
/// while let Some(alert) = rx.recv().await {
///     println!("{alert}");
/// }
/// ```
pub struct DropMonitor<T: NetlinkTransport> {
    state: MonitorState,
    transport: Option<T>,
    family: Option<FamilyInfo>,
    seq: u32,
    options: MonitorOptions,
    receiver: Option<Receiver<T>>,
    stats: Arc<MonitorStats>,
}

#[cfg(target_os = "linux")]
impl DropMonitor<crate::transport::GenlSocket> {
    /// 커널 소켓을 열고 NET_DM 패밀리를 조회합니다.
    pub async fn connect() -> Result<Self, DropmonError> {
        Self::connect_with_options(MonitorOptions::default()).await
    }

    /// 타이밍 설정을 지정해 연결합니다.
    pub async fn connect_with_options(options: MonitorOptions) -> Result<Self, DropmonError> {
        let socket = crate::transport::GenlSocket::open()?;
        let mut monitor = Self::with_options(socket, options);
        monitor.init().await?;
        Ok(monitor)
    }
}

impl<T: NetlinkTransport> DropMonitor<T> {
    /// 전송 계층으로 클라이언트를 생성합니다 (`Uninitialized`).
    pub fn new(transport: T) -> Self {
        Self::with_options(transport, MonitorOptions::default())
    }

    /// 타이밍 설정을 지정해 생성합니다.
    pub fn with_options(transport: T, options: MonitorOptions) -> Self {
        Self {
            state: MonitorState::Uninitialized,
            transport: Some(transport),
            family: None,
            seq: 0,
            options,
            receiver: None,
            stats: Arc::new(MonitorStats::default()),
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// 조회된 패밀리 정보 (`init()` 이후)
    pub fn family(&self) -> Option<&FamilyInfo> {
        self.family.as_ref()
    }

    /// 수신 카운터
    pub fn stats(&self) -> Arc<MonitorStats> {
        Arc::clone(&self.stats)
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    /// NET_DM 패밀리를 조회합니다. 성공하면 `Ready`로 전이합니다.
    pub async fn init(&mut self) -> Result<(), DropmonError> {
        if self.state != MonitorState::Uninitialized {
            return Err(DropmonError::InvalidState {
                operation: "init",
                state: self.state,
            });
        }

        let seq = self.next_seq();
        let request = encode_get_family(NET_DM_FAMILY_NAME, seq);
        let timeout = self.options.ack_timeout;
        let transport = self.transport.as_mut().ok_or(DropmonError::InvalidState {
            operation: "init",
            state: MonitorState::Closed,
        })?;

        let replies = match transact(transport, &request, seq, timeout, "GETFAMILY").await {
            Ok(replies) => replies,
            Err(DropmonError::Command { errno, .. }) if errno == ENOENT => {
                return Err(DropmonError::FamilyUnavailable(NET_DM_FAMILY_NAME.to_owned()));
            }
            Err(e) => return Err(e),
        };
        let attrs = replies
            .first()
            .ok_or_else(|| DropmonError::FamilyUnavailable(NET_DM_FAMILY_NAME.to_owned()))?;
        let family = parse_family(attrs)?;

        info!(
            family = %family.name,
            id = family.id,
            version = family.version,
            groups = family.groups.len(),
            "resolved drop monitor family"
        );
        self.family = Some(family);
        self.state = MonitorState::Ready;
        Ok(())
    }

    /// 알림 모드를 설정합니다.
    pub async fn set_alert_mode(&mut self, mode: AlertMode) -> Result<(), DropmonError> {
        let mut attrs = AttributeEncoder::new();
        attrs.u8(NET_DM_ATTR_ALERT_MODE, mode.as_raw());
        self.command("configure", NET_DM_CMD_CONFIG, attrs.finish())
            .await
    }

    /// 페이로드 절단 길이를 설정합니다.
    pub async fn set_trunc_len(&mut self, trunc_len: u32) -> Result<(), DropmonError> {
        let mut attrs = AttributeEncoder::new();
        attrs.u32(NET_DM_ATTR_TRUNC_LEN, trunc_len);
        self.command("configure", NET_DM_CMD_CONFIG, attrs.finish())
            .await
    }

    /// 알림 모드와 절단 길이를 각각 설정합니다.
    ///
    /// 두 명령을 모두 시도하고 실패는 각각 로그에 남기며, 첫 에러를 반환합니다.
    /// `trunc_len`이 `None`이면 커널 설정을 유지합니다. 상태는 바뀌지 않습니다.
    pub async fn configure(
        &mut self,
        mode: AlertMode,
        trunc_len: Option<u32>,
    ) -> Result<(), DropmonError> {
        let mut first_error = None;

        if let Err(e) = self.set_alert_mode(mode).await {
            warn!(mode = %mode, error = %e, "failed to set alert mode");
            first_error.get_or_insert(e);
        }
        if let Some(trunc_len) = trunc_len {
            if let Err(e) = self.set_trunc_len(trunc_len).await {
                warn!(trunc_len, error = %e, "failed to set truncation length");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                debug!(mode = %mode, ?trunc_len, "drop monitor configured");
                Ok(())
            }
        }
    }

    /// 소프트웨어/하드웨어 드롭 모니터링을 켭니다 (`true`인 쪽만).
    pub async fn enable_monitoring(&mut self, sw: bool, hw: bool) -> Result<(), DropmonError> {
        let attrs = origin_flags(sw, hw);
        self.command("enable monitoring", NET_DM_CMD_START, attrs)
            .await?;
        info!(sw, hw, "drop monitoring enabled");
        Ok(())
    }

    /// 소프트웨어/하드웨어 드롭 모니터링을 끕니다 (`true`인 쪽만).
    pub async fn disable_monitoring(&mut self, sw: bool, hw: bool) -> Result<(), DropmonError> {
        let attrs = origin_flags(sw, hw);
        self.command("disable monitoring", NET_DM_CMD_STOP, attrs)
            .await?;
        info!(sw, hw, "drop monitoring disabled");
        Ok(())
    }

    async fn command(
        &mut self,
        operation: &'static str,
        cmd: u8,
        attrs: Bytes,
    ) -> Result<(), DropmonError> {
        if self.state != MonitorState::Ready {
            return Err(DropmonError::InvalidState {
                operation,
                state: self.state,
            });
        }
        let family = self.family.as_ref().ok_or(DropmonError::InvalidState {
            operation,
            state: MonitorState::Uninitialized,
        })?;
        let (family_id, version) = (family.id, family.version);

        let seq = self.next_seq();
        let request = encode_genl(
            family_id,
            NLM_F_REQUEST | NLM_F_ACK,
            seq,
            GenlHeader { cmd, version },
            &attrs,
        );
        let timeout = self.options.ack_timeout;
        let transport = self.transport.as_mut().ok_or(DropmonError::InvalidState {
            operation,
            state: MonitorState::Closed,
        })?;

        transact(transport, &request, seq, timeout, command_name(cmd)).await?;
        debug!(command = command_name(cmd), seq, "command acknowledged");
        Ok(())
    }

    /// 알림 그룹에 가입하고 수신 루프를 시작합니다.
    ///
    /// 디코딩된 알림은 `tx`로 전달되며, 루프가 끝나면 `tx`가 닫힙니다.
    pub fn start(&mut self, tx: mpsc::Sender<AlertEvent>) -> Result<(), DropmonError> {
        if self.state != MonitorState::Ready {
            return Err(DropmonError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        let family = self.family.as_ref().ok_or(DropmonError::InvalidState {
            operation: "start",
            state: MonitorState::Uninitialized,
        })?;
        let family_id = family.id;
        let group = family.group_id(NET_DM_GRP_NAME).unwrap_or(NET_DM_GRP_ALERT);

        let mut transport = self.transport.take().ok_or(DropmonError::InvalidState {
            operation: "start",
            state: MonitorState::Closed,
        })?;
        if let Err(e) = transport.add_membership(group) {
            self.transport = Some(transport);
            return Err(DropmonError::Subscription {
                group,
                reason: e.to_string(),
            });
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(receive_loop(
            transport,
            family_id,
            group,
            tx,
            cancel.clone(),
            Arc::clone(&self.stats),
        ));
        self.receiver = Some(Receiver { cancel, task });
        self.state = MonitorState::Receiving;
        info!(group, "drop monitor receiving alerts");
        Ok(())
    }

    /// 수신 루프를 멈추고 `Ready`로 돌아갑니다.
    ///
    /// 수신 중이 아니면 아무 일도 하지 않습니다. 태스크가 `stop_timeout` 안에
    /// 끝나지 않으면 중단시키며, 이때 소켓을 잃으므로 `Closed`가 됩니다.
    pub async fn stop(&mut self) -> Result<(), DropmonError> {
        let Some(Receiver { cancel, mut task }) = self.receiver.take() else {
            return Ok(());
        };
        cancel.cancel();

        match tokio::time::timeout(self.options.stop_timeout, &mut task).await {
            Ok(Ok(transport)) => {
                self.transport = Some(transport);
                self.state = MonitorState::Ready;
                info!("drop monitor receive loop stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                self.state = MonitorState::Closed;
                error!(error = %e, "drop monitor receive task failed");
                Err(DropmonError::Connection(format!("receive task failed: {e}")))
            }
            Err(_) => {
                task.abort();
                self.state = MonitorState::Closed;
                warn!(
                    timeout_ms = self.options.stop_timeout.as_millis() as u64,
                    "receive loop did not stop in time, aborted"
                );
                Err(DropmonError::Timeout("receive loop shutdown".to_owned()))
            }
        }
    }

    /// 소켓을 해제합니다. 모든 상태에서 호출할 수 있으며 멱등입니다.
    pub async fn close(&mut self) {
        if self.state == MonitorState::Closed && self.transport.is_none() {
            return;
        }
        if let Err(e) = self.stop().await {
            warn!(error = %e, "error while stopping drop monitor on close");
        }
        self.transport = None;
        self.state = MonitorState::Closed;
        debug!("drop monitor closed");
    }
}

impl<T: NetlinkTransport> Drop for DropMonitor<T> {
    fn drop(&mut self) {
        if let Some(receiver) = &self.receiver {
            receiver.cancel.cancel();
        }
    }
}

fn origin_flags(sw: bool, hw: bool) -> Bytes {
    let mut attrs = AttributeEncoder::new();
    if sw {
        attrs.flag(NET_DM_ATTR_SW_DROPS);
    }
    if hw {
        attrs.flag(NET_DM_ATTR_HW_DROPS);
    }
    attrs.finish()
}

/// 요청을 보내고 같은 seq의 ACK(`NLMSG_ERROR`)까지 응답을 모읍니다.
///
/// 다른 seq의 메시지(멀티캐스트 알림 등)는 무시합니다.
async fn transact<T: NetlinkTransport>(
    transport: &mut T,
    request: &[u8],
    seq: u32,
    timeout: Duration,
    what: &'static str,
) -> Result<Vec<Bytes>, DropmonError> {
    transport.send(request).await?;

    let deadline = Instant::now() + timeout;
    let mut replies = Vec::new();
    loop {
        let datagram = match tokio::time::timeout_at(deadline, transport.recv()).await {
            Ok(Ok(buf)) => buf,
            Ok(Err(e)) if is_overrun(&e) => {
                warn!(command = what, "netlink socket overrun while waiting for reply");
                continue;
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(DropmonError::Timeout(format!("{what} acknowledgement"))),
        };

        for msg in MessageIter::new(&datagram) {
            match msg? {
                NetlinkMessage::Error { seq: s, errno } if s == seq => {
                    if errno == 0 {
                        return Ok(replies);
                    }
                    return Err(DropmonError::Command {
                        command: what,
                        errno,
                    });
                }
                NetlinkMessage::Done { seq: s } if s == seq => return Ok(replies),
                NetlinkMessage::Generic { header, attrs, .. } if header.seq == seq => {
                    replies.push(Bytes::copy_from_slice(attrs));
                }
                _ => {}
            }
        }
    }
}

async fn receive_loop<T: NetlinkTransport>(
    mut transport: T,
    family_id: u16,
    group: u32,
    tx: mpsc::Sender<AlertEvent>,
    cancel: CancellationToken,
    stats: Arc<MonitorStats>,
) -> T {
    'recv: loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break 'recv,
            result = transport.recv() => result,
        };

        let datagram = match result {
            Ok(buf) => buf,
            Err(e) if is_overrun(&e) => {
                stats.record_overrun();
                warn!("netlink socket overrun, drop alerts were lost");
                continue;
            }
            Err(e) => {
                error!(error = %e, "netlink receive failed, stopping receive loop");
                break 'recv;
            }
        };
        let received_at = SystemTime::now();

        for msg in MessageIter::new(&datagram) {
            let decoded = match msg {
                Ok(NetlinkMessage::Generic {
                    header,
                    genl,
                    attrs,
                }) if header.msg_type == family_id && genl.cmd == NET_DM_CMD_PACKET_ALERT => {
                    decode_alert(attrs, received_at).map_err(DropmonError::from)
                }
                Ok(_) => continue,
                Err(e) => Err(DropmonError::from(e)),
            };

            let alert = match decoded {
                Ok(alert) => alert,
                Err(e) => {
                    stats.record_decode_error();
                    warn!(error = %e, datagram_len = datagram.len(), "dropping undecodable alert");
                    continue;
                }
            };
            stats.record_alert(&alert);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'recv,
                sent = tx.send(alert) => {
                    if sent.is_err() {
                        debug!("alert receiver closed, stopping receive loop");
                        break 'recv;
                    }
                }
            }
        }
    }

    if let Err(e) = transport.drop_membership(group) {
        warn!(group, error = %e, "failed to leave alert multicast group");
    }
    drop(tx);
    debug!(
        alerts = stats.alerts_received(),
        decode_errors = stats.decode_errors(),
        "receive loop exited"
    );
    transport
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::NET_DM_ORIGIN_SW;
    use crate::testing::{AlertFixture, MOCK_FAMILY_ID, MockKernel, MockTransport};

    async fn ready_monitor(kernel: &MockKernel) -> DropMonitor<MockTransport> {
        let mut monitor = DropMonitor::new(kernel.transport());
        monitor.init().await.unwrap();
        monitor
    }

    #[test]
    fn alert_mode_names() {
        assert_eq!(AlertMode::from_name("packet"), Some(AlertMode::Packet));
        assert_eq!(AlertMode::from_name("SUMMARY"), Some(AlertMode::Summary));
        assert_eq!(AlertMode::from_name("full"), None);
        assert_eq!(AlertMode::Packet.as_raw(), 1);
        assert_eq!(AlertMode::Summary.to_string(), "summary");
    }

    #[test]
    fn state_display() {
        assert_eq!(MonitorState::Receiving.to_string(), "receiving");
        assert_eq!(MonitorState::Closed.to_string(), "closed");
    }

    #[tokio::test]
    async fn init_resolves_family() {
        let kernel = MockKernel::new();
        let monitor = ready_monitor(&kernel).await;
        assert_eq!(monitor.state(), MonitorState::Ready);
        let family = monitor.family().unwrap();
        assert_eq!(family.id, MOCK_FAMILY_ID);
        assert_eq!(family.group_id("events"), Some(NET_DM_GRP_ALERT));
    }

    #[tokio::test]
    async fn init_without_family_fails() {
        let kernel = MockKernel::without_family();
        let mut monitor = DropMonitor::new(kernel.transport());
        let err = monitor.init().await.unwrap_err();
        assert!(matches!(err, DropmonError::FamilyUnavailable(_)));
        assert_eq!(monitor.state(), MonitorState::Uninitialized);
    }

    #[tokio::test]
    async fn init_twice_is_rejected() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;
        assert!(matches!(
            monitor.init().await,
            Err(DropmonError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn commands_require_ready() {
        let kernel = MockKernel::new();
        let mut monitor = DropMonitor::new(kernel.transport());
        let err = monitor.enable_monitoring(true, false).await.unwrap_err();
        assert!(matches!(
            err,
            DropmonError::InvalidState {
                state: MonitorState::Uninitialized,
                ..
            }
        ));
        assert!(kernel.commands().is_empty());
    }

    #[tokio::test]
    async fn configure_sets_mode_and_trunc_len() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;
        monitor
            .configure(AlertMode::Packet, Some(128))
            .await
            .unwrap();
        assert_eq!(kernel.alert_mode(), Some(NET_DM_ALERT_MODE_PACKET));
        assert_eq!(kernel.trunc_len(), Some(128));
        assert_eq!(kernel.commands(), vec![NET_DM_CMD_CONFIG, NET_DM_CMD_CONFIG]);
    }

    #[tokio::test]
    async fn configure_without_trunc_len_sends_one_command() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;
        monitor.configure(AlertMode::Summary, None).await.unwrap();
        assert_eq!(kernel.commands().len(), 1);
        assert_eq!(kernel.trunc_len(), None);
    }

    #[tokio::test]
    async fn configure_failure_keeps_state() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;
        kernel.fail_command(NET_DM_CMD_CONFIG, 16); // EBUSY
        let err = monitor
            .configure(AlertMode::Packet, Some(64))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DropmonError::Command {
                command: "CONFIG",
                errno: 16
            }
        ));
        // 두 번째 명령은 계속 시도됨
        assert_eq!(kernel.trunc_len(), Some(64));
        assert_eq!(monitor.state(), MonitorState::Ready);
    }

    #[tokio::test]
    async fn enable_and_disable_flags() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;

        monitor.enable_monitoring(true, true).await.unwrap();
        assert!(kernel.sw_enabled());
        assert!(kernel.hw_enabled());

        monitor.disable_monitoring(true, false).await.unwrap();
        assert!(!kernel.sw_enabled());
        assert!(kernel.hw_enabled());
    }

    #[test]
    fn origin_flags_encode_only_true() {
        assert!(origin_flags(false, false).is_empty());
        assert_eq!(origin_flags(true, false).len(), 4);
        assert_eq!(origin_flags(true, true).len(), 8);
    }

    #[tokio::test]
    async fn start_delivers_alerts_and_stop_returns_to_ready() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;
        monitor.enable_monitoring(true, true).await.unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        monitor.start(tx).unwrap();
        assert_eq!(monitor.state(), MonitorState::Receiving);
        assert!(kernel.is_member(NET_DM_GRP_ALERT));

        assert!(kernel.inject_alert(&AlertFixture::software("tcp_v4_rcv")));
        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.symbol.as_deref(), Some("tcp_v4_rcv"));
        assert_eq!(monitor.stats().alerts_received(), 1);

        monitor.stop().await.unwrap();
        assert_eq!(monitor.state(), MonitorState::Ready);
        assert!(!kernel.is_member(NET_DM_GRP_ALERT));
        // 루프 종료 시 송신측이 닫힘
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn decode_error_does_not_stop_loop() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;
        monitor.enable_monitoring(true, false).await.unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        monitor.start(tx).unwrap();

        let mut bad = AttributeEncoder::new();
        bad.u32(crate::consts::NET_DM_ATTR_ORIGIN, u32::from(NET_DM_ORIGIN_SW));
        let datagram = encode_genl(
            MOCK_FAMILY_ID,
            0,
            0,
            GenlHeader {
                cmd: NET_DM_CMD_PACKET_ALERT,
                version: 2,
            },
            &bad.finish(),
        );
        assert!(kernel.inject_raw(datagram));
        kernel.inject_overrun();
        assert!(kernel.inject_alert(&AlertFixture::software("ip_rcv_finish")));

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.symbol.as_deref(), Some("ip_rcv_finish"));
        let stats = monitor.stats();
        assert_eq!(stats.decode_errors(), 1);
        assert_eq!(stats.overruns(), 1);
        assert_eq!(stats.alerts_received(), 1);

        monitor.close().await;
    }

    #[tokio::test]
    async fn other_commands_are_ignored() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;
        monitor.enable_monitoring(true, false).await.unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        monitor.start(tx).unwrap();

        // summary 모드 알림은 무시
        let summary = encode_genl(
            MOCK_FAMILY_ID,
            0,
            0,
            GenlHeader {
                cmd: crate::consts::NET_DM_CMD_ALERT,
                version: 2,
            },
            &[],
        );
        assert!(kernel.inject_raw(summary));
        assert!(kernel.inject_alert(&AlertFixture::software("kfree_skb")));

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.symbol.as_deref(), Some("kfree_skb"));
        assert_eq!(monitor.stats().decode_errors(), 0);
        monitor.close().await;
    }

    #[tokio::test]
    async fn subscription_failure_keeps_ready() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;
        kernel.fail_membership();
        let (tx, _rx) = mpsc::channel(1);
        let err = monitor.start(tx).unwrap_err();
        assert!(matches!(err, DropmonError::Subscription { group: 1, .. }));
        assert_eq!(monitor.state(), MonitorState::Ready);
        // 소켓은 유지되어 명령을 계속 보낼 수 있음
        monitor.enable_monitoring(true, false).await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;
        monitor.stop().await.unwrap();
        assert_eq!(monitor.state(), MonitorState::Ready);

        let (tx, _rx) = mpsc::channel(1);
        monitor.start(tx).unwrap();
        monitor.stop().await.unwrap();
        monitor.stop().await.unwrap();
        assert_eq!(monitor.state(), MonitorState::Ready);
    }

    #[tokio::test]
    async fn close_from_any_state() {
        let kernel = MockKernel::new();
        let mut fresh = DropMonitor::new(kernel.transport());
        fresh.close().await;
        assert_eq!(fresh.state(), MonitorState::Closed);
        fresh.close().await;

        let mut receiving = ready_monitor(&kernel).await;
        let (tx, mut rx) = mpsc::channel(1);
        receiving.start(tx).unwrap();
        receiving.close().await;
        assert_eq!(receiving.state(), MonitorState::Closed);
        assert!(rx.recv().await.is_none());

        let err = receiving.enable_monitoring(true, true).await.unwrap_err();
        assert_eq!(err.to_string(), "cannot enable monitoring while closed");
    }

    #[tokio::test]
    async fn socket_error_ends_loop() {
        let kernel = MockKernel::new();
        let mut monitor = ready_monitor(&kernel).await;
        let (tx, mut rx) = mpsc::channel(1);
        monitor.start(tx).unwrap();
        kernel.inject_socket_error(9); // EBADF
        assert!(rx.recv().await.is_none());
        monitor.stop().await.unwrap();
        assert_eq!(monitor.state(), MonitorState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn command_times_out_without_ack() {
        struct SilentTransport;
        impl NetlinkTransport for SilentTransport {
            async fn send(&mut self, _buf: &[u8]) -> std::io::Result<()> {
                Ok(())
            }
            async fn recv(&mut self) -> std::io::Result<Vec<u8>> {
                std::future::pending().await
            }
            fn add_membership(&mut self, _group: u32) -> std::io::Result<()> {
                Ok(())
            }
            fn drop_membership(&mut self, _group: u32) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut monitor = DropMonitor::new(SilentTransport);
        let err = monitor.init().await.unwrap_err();
        assert!(matches!(err, DropmonError::Timeout(_)));
    }
}
