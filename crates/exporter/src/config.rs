//! 익스포터 설정
//!
//! core의 [`ExportersConfig`] 섹션에서 익스포터별 설정을 만듭니다.
//! 공통 값(`queue_capacity`, `drop_policy`, `on_stop`, `stop_timeout_secs`)은
//! 각 익스포터 섹션의 값으로 덮어쓸 수 있습니다.
//!
//! 섹션 검증은 익스포터마다 따로 수행되므로, 한 섹션의 오류는
//! 해당 익스포터만 비활성화합니다.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use dropwatch_core::config::{
    ConsoleExporterConfig, ExportersConfig, PcapExporterConfig, TelegrafExporterConfig,
};
use serde::{Deserialize, Serialize};

use crate::error::ExporterError;

/// 큐가 가득 찼을 때의 드롭 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// 가장 오래된 메시지를 드롭 (기본값)
    #[default]
    Oldest,
    /// 새 메시지를 거부
    Newest,
}

impl DropPolicy {
    /// 설정 문자열을 변환합니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "oldest" => Some(Self::Oldest),
            "newest" => Some(Self::Newest),
            _ => None,
        }
    }
}

/// 정지 시 큐에 남은 메시지 처리 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopPolicy {
    /// 남은 메시지를 모두 출력한 뒤 종료 (기본값)
    #[default]
    Drain,
    /// 남은 메시지를 버리고 종료
    Discard,
}

impl StopPolicy {
    /// 설정 문자열을 변환합니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "drain" => Some(Self::Drain),
            "discard" => Some(Self::Discard),
            _ => None,
        }
    }
}

/// 모든 익스포터에 공통인 큐/생명주기 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterSettings {
    /// 큐 용량
    pub queue_capacity: usize,
    /// 큐 오버플로우 정책
    pub drop_policy: DropPolicy,
    /// 정지 시 남은 메시지 처리
    pub on_stop: StopPolicy,
    /// 처리 루프 종료 대기 시간
    pub stop_timeout: Duration,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            drop_policy: DropPolicy::Oldest,
            on_stop: StopPolicy::Drain,
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl ExporterSettings {
    /// 공통 섹션과 익스포터별 오버라이드를 합칩니다.
    pub fn resolve(
        exporter: &'static str,
        common: &ExportersConfig,
        queue_capacity: Option<usize>,
        drop_policy: Option<&str>,
    ) -> Result<Self, ExporterError> {
        let queue_capacity = queue_capacity.unwrap_or(common.queue_capacity);
        if queue_capacity == 0 {
            return Err(ExporterError::config(
                exporter,
                "queue_capacity must be greater than 0",
            ));
        }

        let policy_name = drop_policy.unwrap_or(&common.drop_policy);
        let drop_policy = DropPolicy::from_name(policy_name).ok_or_else(|| {
            ExporterError::config(
                exporter,
                format!("unknown drop_policy '{policy_name}' (expected oldest or newest)"),
            )
        })?;

        let on_stop = StopPolicy::from_name(&common.on_stop).ok_or_else(|| {
            ExporterError::config(
                exporter,
                format!(
                    "unknown on_stop '{}' (expected drain or discard)",
                    common.on_stop
                ),
            )
        })?;

        Ok(Self {
            queue_capacity,
            drop_policy,
            on_stop,
            stop_timeout: Duration::from_secs(common.stop_timeout_secs),
        })
    }
}

/// 콘솔 익스포터 설정
#[derive(Debug, Clone, Default)]
pub struct ConsoleConfig {
    /// 패킷 JSON 들여쓰기
    pub pretty: bool,
    /// 큐/생명주기 설정
    pub settings: ExporterSettings,
}

impl ConsoleConfig {
    /// core 설정 섹션에서 생성합니다.
    pub fn from_core(
        section: &ConsoleExporterConfig,
        common: &ExportersConfig,
    ) -> Result<Self, ExporterError> {
        Ok(Self {
            pretty: section.pretty,
            settings: ExporterSettings::resolve(
                crate::console::NAME,
                common,
                section.queue_capacity,
                section.drop_policy.as_deref(),
            )?,
        })
    }
}

/// pcap 익스포터 설정
#[derive(Debug, Clone)]
pub struct PcapConfig {
    /// 출력 파일 경로 (시작 시 새로 생성)
    pub file_name: PathBuf,
    /// 배치마다 flush
    pub flush_each: bool,
    /// 큐/생명주기 설정
    pub settings: ExporterSettings,
}

impl PcapConfig {
    /// 기본 설정으로 경로만 지정합니다.
    pub fn new(file_name: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            flush_each: true,
            settings: ExporterSettings::default(),
        }
    }

    /// core 설정 섹션에서 생성합니다.
    pub fn from_core(
        section: &PcapExporterConfig,
        common: &ExportersConfig,
    ) -> Result<Self, ExporterError> {
        let name = crate::pcap::NAME;
        if section.file_name.trim().is_empty() {
            return Err(ExporterError::config(name, "file_name must not be empty"));
        }
        Ok(Self {
            file_name: PathBuf::from(&section.file_name),
            flush_each: section.flush_each,
            settings: ExporterSettings::resolve(
                name,
                common,
                section.queue_capacity,
                section.drop_policy.as_deref(),
            )?,
        })
    }
}

/// Telegraf 익스포터 설정
#[derive(Debug, Clone)]
pub struct TelegrafConfig {
    /// 레코드의 `deviceIP` 값
    pub device_ip: String,
    /// 수집기 주소 (host:port)
    pub conn_addr: String,
    /// 연결 타임아웃
    pub conn_timeout: Duration,
    /// 배치 전송 주기
    pub send_interval: Duration,
    /// 큐/생명주기 설정
    pub settings: ExporterSettings,
}

impl TelegrafConfig {
    /// 기본 타이밍으로 수집기 주소만 지정합니다.
    pub fn new(conn_addr: impl Into<String>, device_ip: impl Into<String>) -> Self {
        Self {
            device_ip: device_ip.into(),
            conn_addr: conn_addr.into(),
            conn_timeout: Duration::from_secs(2),
            send_interval: Duration::from_secs(5),
            settings: ExporterSettings::default(),
        }
    }

    /// core 설정 섹션에서 생성합니다.
    pub fn from_core(
        section: &TelegrafExporterConfig,
        common: &ExportersConfig,
    ) -> Result<Self, ExporterError> {
        let name = crate::telegraf::NAME;

        if section.device_ip.parse::<IpAddr>().is_err() {
            return Err(ExporterError::config(
                name,
                format!("device_ip '{}' is not an IP address", section.device_ip),
            ));
        }

        let valid_addr = section
            .conn_addr
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid_addr {
            return Err(ExporterError::config(
                name,
                format!("conn_addr '{}' must be host:port", section.conn_addr),
            ));
        }

        if section.conn_timeout_ms == 0 {
            return Err(ExporterError::config(
                name,
                "conn_timeout_ms must be greater than 0",
            ));
        }
        if section.send_interval_ms == 0 {
            return Err(ExporterError::config(
                name,
                "send_interval_ms must be greater than 0",
            ));
        }

        Ok(Self {
            device_ip: section.device_ip.clone(),
            conn_addr: section.conn_addr.clone(),
            conn_timeout: Duration::from_millis(section.conn_timeout_ms),
            send_interval: Duration::from_millis(section.send_interval_ms),
            settings: ExporterSettings::resolve(
                name,
                common,
                section.queue_capacity,
                section.drop_policy.as_deref(),
            )?,
        })
    }
}
