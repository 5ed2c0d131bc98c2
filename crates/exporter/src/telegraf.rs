//! Telegraf 익스포터 -- 주기적 배치 TCP/JSON 전송
//!
//! 메시지는 큐에 쌓이고, `send_interval`마다 큐 전체가 하나의 JSON 배열로
//! 직렬화되어 새 TCP 연결로 전송된 뒤 연결이 닫힙니다.
//! 빈 주기에는 연결하지 않습니다. 전송 실패한 배치는 다시 큐에 넣지 않습니다.
//!
//! # 레코드 형식
//! ```json
//! {"dropType":"l2","dropReason":"ingress_vlan_filter","ingressPort":"swp3",
//!  "severity":"Notice","deviceIP":"10.0.0.1","timestamp":"1700000000.5",
//!  "message":"fwdDrop","packet":null}
//! ```

use std::sync::Arc;
use std::time::Duration;

use dropwatch_core::event::WriteMsg;
use dropwatch_core::types::PacketSummary;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::TelegrafConfig;
use crate::error::ExporterError;
use crate::exporter::ExportSink;

/// 익스포터 이름
pub const NAME: &str = "telegraf";

const SEVERITY: &str = "Notice";
const MESSAGE: &str = "fwdDrop";

/// 트랩 그룹 이름을 `dropType` 값으로 변환합니다.
pub fn drop_type(trap_group: Option<&str>) -> &'static str {
    match trap_group {
        Some("l2_drops") => "l2",
        Some("l3_drops" | "l3_exceptions") => "l3",
        Some("buffer_drops") => "buffer",
        Some("tunnel_drops") => "tunnel",
        Some("acl_drops") => "acl",
        _ => "unknown",
    }
}

/// 수집기로 보내는 레코드 한 건
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegrafRecord<'a> {
    pub drop_type: &'static str,
    pub drop_reason: &'a str,
    pub ingress_port: &'a str,
    pub severity: &'static str,
    #[serde(rename = "deviceIP")]
    pub device_ip: &'a str,
    pub timestamp: String,
    pub message: &'static str,
    pub packet: Option<&'a PacketSummary>,
}

impl<'a> TelegrafRecord<'a> {
    /// 메시지를 레코드로 변환합니다.
    pub fn from_msg(msg: &'a WriteMsg, device_ip: &'a str) -> Self {
        let alert = &msg.alert;
        let since_epoch = alert.since_epoch();
        Self {
            drop_type: drop_type(alert.trap_group.as_deref()),
            drop_reason: alert.drop_point(),
            ingress_port: alert.port_name().unwrap_or_default(),
            severity: SEVERITY,
            device_ip,
            timestamp: format!("{}.{}", since_epoch.as_secs(), since_epoch.subsec_nanos()),
            message: MESSAGE,
            packet: msg.packet.as_ref(),
        }
    }
}

/// 메시지 묶음을 JSON 배열로 직렬화합니다.
pub fn encode_batch(batch: &[Arc<WriteMsg>], device_ip: &str) -> Result<Vec<u8>, ExporterError> {
    let records: Vec<TelegrafRecord<'_>> = batch
        .iter()
        .map(|msg| TelegrafRecord::from_msg(msg, device_ip))
        .collect();
    Ok(serde_json::to_vec(&records)?)
}

/// Telegraf TCP 싱크
pub struct TelegrafSink {
    device_ip: String,
    conn_addr: String,
    conn_timeout: Duration,
    send_interval: Duration,
    batches_sent: u64,
}

impl TelegrafSink {
    /// 설정으로 싱크를 생성합니다.
    pub fn new(config: &TelegrafConfig) -> Self {
        Self {
            device_ip: config.device_ip.clone(),
            conn_addr: config.conn_addr.clone(),
            conn_timeout: config.conn_timeout,
            send_interval: config.send_interval,
            batches_sent: 0,
        }
    }

    /// 전송에 성공한 배치 수
    pub fn batches_sent(&self) -> u64 {
        self.batches_sent
    }

    async fn send(&self, body: &[u8]) -> Result<(), ExporterError> {
        let mut stream = tokio::time::timeout(self.conn_timeout, TcpStream::connect(&self.conn_addr))
            .await
            .map_err(|_| {
                ExporterError::io(
                    NAME,
                    format!(
                        "connect to {} timed out after {}ms",
                        self.conn_addr,
                        self.conn_timeout.as_millis()
                    ),
                )
            })?
            .map_err(|e| ExporterError::io(NAME, format!("connect to {}: {e}", self.conn_addr)))?;

        stream
            .write_all(body)
            .await
            .map_err(|e| ExporterError::io(NAME, format!("send to {}: {e}", self.conn_addr)))?;
        stream
            .shutdown()
            .await
            .map_err(|e| ExporterError::io(NAME, e))?;
        Ok(())
    }
}

impl ExportSink for TelegrafSink {
    fn name(&self) -> &'static str {
        NAME
    }

    fn flush_interval(&self) -> Option<Duration> {
        Some(self.send_interval)
    }

    async fn open(&mut self) -> Result<(), ExporterError> {
        tracing::info!(
            conn_addr = %self.conn_addr,
            interval_ms = self.send_interval.as_millis() as u64,
            "telegraf exporter ready"
        );
        Ok(())
    }

    async fn write_batch(&mut self, batch: Vec<Arc<WriteMsg>>) -> Result<usize, ExporterError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let body = encode_batch(&batch, &self.device_ip)?;
        self.send(&body).await?;
        self.batches_sent += 1;
        tracing::debug!(
            conn_addr = %self.conn_addr,
            records = batch.len(),
            bytes = body.len(),
            "telegraf batch sent"
        );
        Ok(batch.len())
    }

    async fn close(&mut self) -> Result<(), ExporterError> {
        tracing::debug!(batches = self.batches_sent, "telegraf exporter closed");
        Ok(())
    }
}
