//! 테스트 지원 -- 모의 커널과 알림 픽스처
//!
//! [`MockKernel`]은 generic netlink 컨트롤러와 NET_DM 패밀리를 흉내냅니다.
//!
//! - `CTRL_CMD_GETFAMILY`: 패밀리 정보 응답 (또는 `ENOENT`)
//! - `CONFIG`/`START`/`STOP`: 상태 반영 후 ACK (주입된 errno가 있으면 에러)
//! - [`MockKernel::inject_alert`]: 그룹 가입 + 해당 origin 모니터링이 켜져 있을 때만 전달
//!
//! ```ignore
//! let kernel = MockKernel::new();
//! let mut monitor = DropMonitor::new(kernel.transport());
//! monitor.init().await?;
//! kernel.inject_alert(&AlertFixture::hardware("ttl_value_is_too_small", "l3_drops"));
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::Notify;

use crate::attr::{AttributeDecoder, AttributeEncoder};
use crate::consts::{
    CTRL_ATTR_FAMILY_NAME, CTRL_CMD_GETFAMILY, ENOBUFS, ENOENT, GENL_ID_CTRL,
    NET_DM_ATTR_ALERT_MODE, NET_DM_ATTR_HW_DROPS, NET_DM_ATTR_HW_TRAP_GROUP_NAME,
    NET_DM_ATTR_HW_TRAP_NAME, NET_DM_ATTR_IN_PORT, NET_DM_ATTR_ORIG_LEN, NET_DM_ATTR_ORIGIN,
    NET_DM_ATTR_PAYLOAD, NET_DM_ATTR_PC, NET_DM_ATTR_PORT_NETDEV_IFINDEX,
    NET_DM_ATTR_PORT_NETDEV_NAME, NET_DM_ATTR_PROTO, NET_DM_ATTR_REASON, NET_DM_ATTR_SW_DROPS,
    NET_DM_ATTR_SYMBOL, NET_DM_ATTR_TIMESTAMP, NET_DM_ATTR_TRUNC_LEN,
    NET_DM_CMD_PACKET_ALERT, NET_DM_CMD_START, NET_DM_CMD_STOP, NET_DM_FAMILY_NAME,
    NET_DM_GRP_ALERT, NET_DM_GRP_NAME, NET_DM_ORIGIN_HW, NET_DM_ORIGIN_SW,
};
use crate::family::{FamilyInfo, McastGroup, encode_family_attrs};
use crate::message::{GenlHeader, MessageIter, NetlinkMessage, encode_error, encode_genl};
use crate::transport::NetlinkTransport;

/// 모의 커널이 사용하는 NET_DM 패밀리 ID
pub const MOCK_FAMILY_ID: u16 = 0x1c;
/// 모의 커널이 보고하는 NET_DM 버전
pub const MOCK_FAMILY_VERSION: u8 = 2;

enum Delivery {
    Datagram(Bytes),
    Error(i32),
}

struct KernelState {
    family_available: bool,
    alert_mode: Option<u8>,
    trunc_len: Option<u32>,
    sw_enabled: bool,
    hw_enabled: bool,
    memberships: HashSet<u32>,
    injected_errors: HashMap<u8, i32>,
    fail_membership: bool,
    commands: Vec<u8>,
    pending: VecDeque<Delivery>,
    alert_seq: u32,
}

/// 모의 커널
///
/// 복제본은 같은 상태를 공유합니다.
#[derive(Clone)]
pub struct MockKernel {
    state: Arc<Mutex<KernelState>>,
    ready: Arc<Notify>,
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKernel {
    /// NET_DM 패밀리가 등록된 커널
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(KernelState {
                family_available: true,
                alert_mode: None,
                trunc_len: None,
                sw_enabled: false,
                hw_enabled: false,
                memberships: HashSet::new(),
                injected_errors: HashMap::new(),
                fail_membership: false,
                commands: Vec::new(),
                pending: VecDeque::new(),
                alert_seq: 0,
            })),
            ready: Arc::new(Notify::new()),
        }
    }

    /// NET_DM 모듈이 없는 커널
    pub fn without_family() -> Self {
        let kernel = Self::new();
        kernel.lock().family_available = false;
        kernel
    }

    fn lock(&self) -> MutexGuard<'_, KernelState> {
        // 테스트 지원 코드: 포이즌은 다른 테스트 스레드의 패닉이므로 상태를 그대로 사용
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deliver(&self, delivery: Delivery) {
        self.lock().pending.push_back(delivery);
        self.ready.notify_one();
    }

    /// 이 커널에 연결된 전송 계층을 만듭니다.
    pub fn transport(&self) -> MockTransport {
        MockTransport {
            kernel: self.clone(),
        }
    }

    /// 다음 `cmd` 명령에 errno로 응답하도록 설정합니다.
    pub fn fail_command(&self, cmd: u8, errno: i32) {
        self.lock().injected_errors.insert(cmd, errno);
    }

    /// 멀티캐스트 그룹 가입이 실패하도록 설정합니다.
    pub fn fail_membership(&self) {
        self.lock().fail_membership = true;
    }

    /// 알림을 주입합니다. 전달되면 `true`.
    ///
    /// 그룹에 가입되어 있고 해당 origin의 모니터링이 켜져 있어야 전달됩니다.
    pub fn inject_alert(&self, fixture: &AlertFixture) -> bool {
        let datagram = {
            let mut state = self.lock();
            if !state.memberships.contains(&NET_DM_GRP_ALERT) {
                return false;
            }
            let enabled = match fixture.origin {
                Some(NET_DM_ORIGIN_SW) => state.sw_enabled,
                Some(NET_DM_ORIGIN_HW) => state.hw_enabled,
                _ => state.sw_enabled || state.hw_enabled,
            };
            if !enabled {
                return false;
            }
            state.alert_seq = state.alert_seq.wrapping_add(1);
            fixture.to_datagram(MOCK_FAMILY_ID, state.alert_seq)
        };
        self.deliver(Delivery::Datagram(datagram));
        true
    }

    /// 임의의 데이터그램을 주입합니다 (그룹 가입 여부만 확인).
    pub fn inject_raw(&self, datagram: impl Into<Bytes>) -> bool {
        if !self.is_member(NET_DM_GRP_ALERT) {
            return false;
        }
        self.deliver(Delivery::Datagram(datagram.into()));
        true
    }

    /// 다음 수신에서 `ENOBUFS`를 반환합니다.
    pub fn inject_overrun(&self) {
        self.deliver(Delivery::Error(ENOBUFS));
    }

    /// 다음 수신에서 복구 불가능한 소켓 에러를 반환합니다.
    pub fn inject_socket_error(&self, errno: i32) {
        self.deliver(Delivery::Error(errno));
    }

    pub fn is_member(&self, group: u32) -> bool {
        self.lock().memberships.contains(&group)
    }

    pub fn sw_enabled(&self) -> bool {
        self.lock().sw_enabled
    }

    pub fn hw_enabled(&self) -> bool {
        self.lock().hw_enabled
    }

    pub fn alert_mode(&self) -> Option<u8> {
        self.lock().alert_mode
    }

    pub fn trunc_len(&self) -> Option<u32> {
        self.lock().trunc_len
    }

    /// 지금까지 받은 NET_DM 명령 목록
    pub fn commands(&self) -> Vec<u8> {
        self.lock().commands.clone()
    }

    fn handle_request(&self, buf: &[u8]) -> io::Result<()> {
        for msg in MessageIter::new(buf) {
            let msg = msg.map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let NetlinkMessage::Generic {
                header,
                genl,
                attrs,
            } = msg
            else {
                continue;
            };

            let mut replies = Vec::new();
            {
                let mut state = self.lock();
                if header.msg_type == GENL_ID_CTRL && genl.cmd == CTRL_CMD_GETFAMILY {
                    let requested = AttributeDecoder::new(attrs)
                        .find(CTRL_ATTR_FAMILY_NAME)
                        .ok()
                        .flatten()
                        .map(|a| a.string());
                    if state.family_available
                        && requested.as_deref() == Some(NET_DM_FAMILY_NAME)
                    {
                        let info = mock_family();
                        replies.push(encode_genl(
                            GENL_ID_CTRL,
                            0,
                            header.seq,
                            GenlHeader {
                                cmd: CTRL_CMD_GETFAMILY,
                                version: 1,
                            },
                            &encode_family_attrs(&info),
                        ));
                        replies.push(encode_error(header.seq, 0, &header));
                    } else {
                        replies.push(encode_error(header.seq, ENOENT, &header));
                    }
                } else if header.msg_type == MOCK_FAMILY_ID && state.family_available {
                    state.commands.push(genl.cmd);
                    let errno = match state.injected_errors.remove(&genl.cmd) {
                        Some(errno) => errno,
                        None => {
                            apply_command(&mut state, genl.cmd, attrs);
                            0
                        }
                    };
                    replies.push(encode_error(header.seq, errno, &header));
                } else {
                    replies.push(encode_error(header.seq, ENOENT, &header));
                }
            }

            for reply in replies {
                self.deliver(Delivery::Datagram(reply));
            }
        }
        Ok(())
    }
}

fn mock_family() -> FamilyInfo {
    FamilyInfo {
        name: NET_DM_FAMILY_NAME.to_owned(),
        id: MOCK_FAMILY_ID,
        version: MOCK_FAMILY_VERSION,
        groups: vec![McastGroup {
            name: NET_DM_GRP_NAME.to_owned(),
            id: NET_DM_GRP_ALERT,
        }],
    }
}

fn apply_command(state: &mut KernelState, cmd: u8, attrs: &[u8]) {
    let mut sw = false;
    let mut hw = false;
    for attr in AttributeDecoder::new(attrs).flatten() {
        match attr.kind() {
            NET_DM_ATTR_ALERT_MODE => state.alert_mode = attr.u8().ok(),
            NET_DM_ATTR_TRUNC_LEN => state.trunc_len = attr.u32().ok(),
            NET_DM_ATTR_SW_DROPS => sw = true,
            NET_DM_ATTR_HW_DROPS => hw = true,
            _ => {}
        }
    }
    match cmd {
        NET_DM_CMD_START => {
            state.sw_enabled |= sw;
            state.hw_enabled |= hw;
        }
        NET_DM_CMD_STOP => {
            state.sw_enabled &= !sw;
            state.hw_enabled &= !hw;
        }
        _ => {}
    }
}

/// [`MockKernel`]에 연결된 전송 계층
pub struct MockTransport {
    kernel: MockKernel,
}

impl NetlinkTransport for MockTransport {
    async fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        self.kernel.handle_request(buf)
    }

    async fn recv(&mut self) -> io::Result<Vec<u8>> {
        loop {
            let next = self.kernel.lock().pending.pop_front();
            match next {
                Some(Delivery::Datagram(buf)) => return Ok(buf.to_vec()),
                Some(Delivery::Error(errno)) => return Err(io::Error::from_raw_os_error(errno)),
                None => self.kernel.ready.notified().await,
            }
        }
    }

    fn add_membership(&mut self, group: u32) -> io::Result<()> {
        let mut state = self.kernel.lock();
        if state.fail_membership {
            return Err(io::Error::from_raw_os_error(1)); // EPERM
        }
        state.memberships.insert(group);
        Ok(())
    }

    fn drop_membership(&mut self, group: u32) -> io::Result<()> {
        self.kernel.lock().memberships.remove(&group);
        Ok(())
    }
}

/// 커널 알림 픽스처
#[derive(Debug, Clone, Default)]
pub struct AlertFixture {
    pub origin: Option<u16>,
    pub trap_name: Option<String>,
    pub trap_group: Option<String>,
    pub symbol: Option<String>,
    pub pc: Option<u64>,
    pub reason: Option<String>,
    pub port: Option<(Option<u32>, Option<String>)>,
    pub timestamp_ns: Option<u64>,
    pub protocol: Option<u16>,
    pub orig_len: Option<u32>,
    pub payload: Option<Vec<u8>>,
}

impl AlertFixture {
    /// 하드웨어 트랩 알림
    pub fn hardware(trap_name: &str, trap_group: &str) -> Self {
        Self {
            origin: Some(NET_DM_ORIGIN_HW),
            trap_name: Some(trap_name.to_owned()),
            trap_group: Some(trap_group.to_owned()),
            ..Default::default()
        }
    }

    /// 소프트웨어 드롭 알림
    pub fn software(symbol: &str) -> Self {
        Self {
            origin: Some(NET_DM_ORIGIN_SW),
            symbol: Some(symbol.to_owned()),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, ifindex: u32, name: &str) -> Self {
        self.port = Some((Some(ifindex), Some(name.to_owned())));
        self
    }

    pub fn with_timestamp_ns(mut self, ns: u64) -> Self {
        self.timestamp_ns = Some(ns);
        self
    }

    pub fn with_payload(mut self, protocol: u16, orig_len: u32, payload: Vec<u8>) -> Self {
        self.protocol = Some(protocol);
        self.orig_len = Some(orig_len);
        self.payload = Some(payload);
        self
    }

    pub fn with_pc(mut self, pc: u64) -> Self {
        self.pc = Some(pc);
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_owned());
        self
    }

    /// 속성 스트림으로 인코딩합니다.
    pub fn encode_attrs(&self) -> Bytes {
        let mut enc = AttributeEncoder::new();
        if let Some(pc) = self.pc {
            enc.u64(NET_DM_ATTR_PC, pc);
        }
        if let Some(symbol) = &self.symbol {
            enc.string(NET_DM_ATTR_SYMBOL, symbol);
        }
        if let Some((ifindex, name)) = &self.port {
            enc.nested(NET_DM_ATTR_IN_PORT, |port| {
                if let Some(ifindex) = ifindex {
                    port.u32(NET_DM_ATTR_PORT_NETDEV_IFINDEX, *ifindex);
                }
                if let Some(name) = name {
                    port.string(NET_DM_ATTR_PORT_NETDEV_NAME, name);
                }
            });
        }
        if let Some(ts) = self.timestamp_ns {
            enc.u64(NET_DM_ATTR_TIMESTAMP, ts);
        }
        if let Some(protocol) = self.protocol {
            enc.u16(NET_DM_ATTR_PROTO, protocol);
        }
        if let Some(payload) = &self.payload {
            enc.bytes(NET_DM_ATTR_PAYLOAD, payload);
        }
        if let Some(orig_len) = self.orig_len {
            enc.u32(NET_DM_ATTR_ORIG_LEN, orig_len);
        }
        if let Some(origin) = self.origin {
            enc.u16(NET_DM_ATTR_ORIGIN, origin);
        }
        if let Some(group) = &self.trap_group {
            enc.string(NET_DM_ATTR_HW_TRAP_GROUP_NAME, group);
        }
        if let Some(name) = &self.trap_name {
            enc.string(NET_DM_ATTR_HW_TRAP_NAME, name);
        }
        if let Some(reason) = &self.reason {
            enc.string(NET_DM_ATTR_REASON, reason);
        }
        enc.finish()
    }

    /// `PACKET_ALERT` 멀티캐스트 데이터그램으로 인코딩합니다.
    pub fn to_datagram(&self, family_id: u16, seq: u32) -> Bytes {
        encode_genl(
            family_id,
            0,
            seq,
            GenlHeader {
                cmd: NET_DM_CMD_PACKET_ALERT,
                version: MOCK_FAMILY_VERSION,
            },
            &self.encode_attrs(),
        )
    }
}
