//! 설정 관리 -- dropwatch.toml 파싱 및 런타임 설정
//!
//! [`DropwatchConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DROPWATCH_MONITOR_HW_DROPS=false` 형식)
//! 3. 설정 파일 (`dropwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! 익스포터 섹션(`[exporters.console]`, `[exporters.pcap]`, `[exporters.telegraf]`)은
//! 존재할 때만 해당 익스포터가 활성화됩니다. 각 섹션은 익스포터 크레이트에서
//! 개별적으로 검증되므로, 잘못된 섹션 하나는 그 익스포터만 비활성화합니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), dropwatch_core::error::DropwatchError> {
//! use dropwatch_core::config::DropwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DropwatchConfig::load("dropwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DropwatchConfig::parse("[monitor]\nhw_drops = false")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DropwatchError};

/// dropwatch 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DropwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 커널 drop monitor 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 익스포터 설정
    #[serde(default)]
    pub exporters: ExportersConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DropwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DropwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DropwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DropwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DropwatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DropwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            DropwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DROPWATCH_{SECTION}_{FIELD}`
    /// 예: `DROPWATCH_EXPORTERS_PCAP_FILE_NAME=/tmp/drops.pcap`
    ///
    /// 익스포터 섹션이 없는 상태에서 해당 섹션의 변수가 지정되면
    /// 기본값으로 섹션을 만든 뒤 값을 적용합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DROPWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DROPWATCH_GENERAL_LOG_FORMAT");

        // Monitor
        override_string(&mut self.monitor.alert_mode, "DROPWATCH_MONITOR_ALERT_MODE");
        override_u32(&mut self.monitor.trunc_len, "DROPWATCH_MONITOR_TRUNC_LEN");
        override_bool(&mut self.monitor.sw_drops, "DROPWATCH_MONITOR_SW_DROPS");
        override_bool(&mut self.monitor.hw_drops, "DROPWATCH_MONITOR_HW_DROPS");
        override_usize(
            &mut self.monitor.channel_capacity,
            "DROPWATCH_MONITOR_CHANNEL_CAPACITY",
        );
        override_bool(
            &mut self.monitor.disable_on_exit,
            "DROPWATCH_MONITOR_DISABLE_ON_EXIT",
        );

        // Exporters
        override_usize(
            &mut self.exporters.queue_capacity,
            "DROPWATCH_EXPORTERS_QUEUE_CAPACITY",
        );
        override_string(
            &mut self.exporters.drop_policy,
            "DROPWATCH_EXPORTERS_DROP_POLICY",
        );
        override_string(&mut self.exporters.on_stop, "DROPWATCH_EXPORTERS_ON_STOP");
        override_u64(
            &mut self.exporters.stop_timeout_secs,
            "DROPWATCH_EXPORTERS_STOP_TIMEOUT_SECS",
        );

        if env_present("DROPWATCH_EXPORTERS_CONSOLE_PRETTY") {
            let console = self.exporters.console.get_or_insert_with(Default::default);
            override_bool(&mut console.pretty, "DROPWATCH_EXPORTERS_CONSOLE_PRETTY");
        }

        if env_present("DROPWATCH_EXPORTERS_PCAP_FILE_NAME") {
            let pcap = self.exporters.pcap.get_or_insert_with(Default::default);
            override_string(&mut pcap.file_name, "DROPWATCH_EXPORTERS_PCAP_FILE_NAME");
        }

        if env_present("DROPWATCH_EXPORTERS_TELEGRAF_CONN_ADDR") {
            self.exporters.telegraf.get_or_insert_with(Default::default);
        }
        if let Some(telegraf) = self.exporters.telegraf.as_mut() {
            override_string(
                &mut telegraf.conn_addr,
                "DROPWATCH_EXPORTERS_TELEGRAF_CONN_ADDR",
            );
            override_string(
                &mut telegraf.device_ip,
                "DROPWATCH_EXPORTERS_TELEGRAF_DEVICE_IP",
            );
            override_u64(
                &mut telegraf.conn_timeout_ms,
                "DROPWATCH_EXPORTERS_TELEGRAF_CONN_TIMEOUT_MS",
            );
            override_u64(
                &mut telegraf.send_interval_ms,
                "DROPWATCH_EXPORTERS_TELEGRAF_SEND_INTERVAL_MS",
            );
        }

        // Metrics
        override_bool(&mut self.metrics.enabled, "DROPWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "DROPWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "DROPWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 개별 익스포터 섹션은 여기서 검증하지 않습니다.
    pub fn validate(&self) -> Result<(), DropwatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let valid_modes = ["packet", "summary"];
        if !valid_modes.contains(&self.monitor.alert_mode.as_str()) {
            return Err(invalid(
                "monitor.alert_mode",
                format!("must be one of: {}", valid_modes.join(", ")),
            ));
        }

        if !self.monitor.sw_drops && !self.monitor.hw_drops {
            return Err(invalid(
                "monitor",
                "at least one of sw_drops or hw_drops must be enabled".to_owned(),
            ));
        }

        if self.monitor.channel_capacity == 0 {
            return Err(invalid(
                "monitor.channel_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.exporters.queue_capacity == 0 {
            return Err(invalid(
                "exporters.queue_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        if !DROP_POLICIES.contains(&self.exporters.drop_policy.as_str()) {
            return Err(invalid(
                "exporters.drop_policy",
                format!("must be one of: {}", DROP_POLICIES.join(", ")),
            ));
        }

        let valid_stop = ["drain", "discard"];
        if !valid_stop.contains(&self.exporters.on_stop.as_str()) {
            return Err(invalid(
                "exporters.on_stop",
                format!("must be one of: {}", valid_stop.join(", ")),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be non-zero when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }

    /// 설정된 익스포터 섹션 수를 반환합니다.
    pub fn configured_exporters(&self) -> usize {
        usize::from(self.exporters.console.is_some())
            + usize::from(self.exporters.pcap.is_some())
            + usize::from(self.exporters.telegraf.is_some())
    }
}

/// 허용되는 큐 오버플로우 정책
pub const DROP_POLICIES: [&str; 2] = ["oldest", "newest"];

fn invalid(field: &str, reason: String) -> DropwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 커널 drop monitor 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 알림 모드 (packet, summary)
    pub alert_mode: String,
    /// 페이로드 절단 길이 (0이면 커널 설정 유지)
    pub trunc_len: u32,
    /// 소프트웨어 드롭 모니터링
    pub sw_drops: bool,
    /// 하드웨어 드롭 모니터링
    pub hw_drops: bool,
    /// 수신 루프 → 처리 루프 채널 용량
    pub channel_capacity: usize,
    /// 종료 시 커널 모니터링 비활성화
    pub disable_on_exit: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            alert_mode: "packet".to_owned(),
            trunc_len: 0,
            sw_drops: true,
            hw_drops: true,
            channel_capacity: 1024,
            disable_on_exit: true,
        }
    }
}

/// 익스포터 공통 설정 및 개별 익스포터 섹션
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportersConfig {
    /// 익스포터별 큐 용량 기본값
    pub queue_capacity: usize,
    /// 큐 오버플로우 정책 기본값 (oldest, newest)
    pub drop_policy: String,
    /// 정지 시 남은 메시지 처리 (drain, discard)
    pub on_stop: String,
    /// 익스포터 정지 대기 시간 (초)
    pub stop_timeout_secs: u64,
    /// 콘솔 익스포터 (섹션이 있으면 활성화)
    pub console: Option<ConsoleExporterConfig>,
    /// pcap 파일 익스포터
    pub pcap: Option<PcapExporterConfig>,
    /// Telegraf TCP/JSON 익스포터
    pub telegraf: Option<TelegrafExporterConfig>,
}

impl Default for ExportersConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            drop_policy: "oldest".to_owned(),
            on_stop: "drain".to_owned(),
            stop_timeout_secs: 5,
            console: None,
            pcap: None,
            telegraf: None,
        }
    }
}

/// 콘솔 익스포터 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleExporterConfig {
    /// 패킷 JSON을 들여쓰기하여 출력
    pub pretty: bool,
    /// 큐 용량 (없으면 공통값)
    pub queue_capacity: Option<usize>,
    /// 드롭 정책 (없으면 공통값)
    pub drop_policy: Option<String>,
}

/// pcap 익스포터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PcapExporterConfig {
    /// 출력 파일 경로
    pub file_name: String,
    /// 배치마다 flush
    pub flush_each: bool,
    /// 큐 용량 (없으면 공통값)
    pub queue_capacity: Option<usize>,
    /// 드롭 정책 (없으면 공통값)
    pub drop_policy: Option<String>,
}

impl Default for PcapExporterConfig {
    fn default() -> Self {
        Self {
            file_name: "/var/lib/dropwatch/drops.pcap".to_owned(),
            flush_each: true,
            queue_capacity: None,
            drop_policy: None,
        }
    }
}

/// Telegraf 익스포터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegrafExporterConfig {
    /// 레코드에 기록할 장비 IP
    pub device_ip: String,
    /// 수집기 주소 (host:port)
    pub conn_addr: String,
    /// 연결 타임아웃 (밀리초)
    pub conn_timeout_ms: u64,
    /// 배치 전송 주기 (밀리초)
    pub send_interval_ms: u64,
    /// 큐 용량 (없으면 공통값)
    pub queue_capacity: Option<usize>,
    /// 드롭 정책 (없으면 공통값)
    pub drop_policy: Option<String>,
}

impl Default for TelegrafExporterConfig {
    fn default() -> Self {
        Self {
            device_ip: "127.0.0.1".to_owned(),
            conn_addr: "127.0.0.1:8094".to_owned(),
            conn_timeout_ms: 2_000,
            send_interval_ms: 5_000,
            queue_capacity: None,
            drop_policy: None,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 메트릭 엔드포인트 활성화
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 경로 (현재 `/metrics`만 지원)
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9108,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn env_present(env_key: &str) -> bool {
    std::env::var_os(env_key).is_some()
}

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
