//! 콘솔 익스포터 -- 사람이 읽는 텍스트 블록 출력
//!
//! 메시지마다 다음과 같은 블록을 출력합니다.
//!
//! ```text
//! drop at: ingress_vlan_filter (l2_drops)
//! origin: hardware
//! input port ifindex: 3
//! input port name: swp3
//! timestamp: 2023-11-14T22:13:20.000000000Z
//! protocol: 0x800
//! length: 60
//! original length: 98
//! Packet: {"packetType":"Transport",...}
//!
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use dropwatch_core::event::WriteMsg;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::ExporterError;
use crate::exporter::ExportSink;

/// 익스포터 이름
pub const NAME: &str = "console";

/// 콘솔 싱크 (기본 출력: stdout)
pub struct ConsoleSink<W = tokio::io::Stdout> {
    writer: W,
    pretty: bool,
}

impl ConsoleSink {
    /// stdout으로 출력하는 싱크
    pub fn stdout(pretty: bool) -> Self {
        Self::with_writer(tokio::io::stdout(), pretty)
    }
}

impl<W> ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    /// 임의의 writer로 출력하는 싱크
    pub fn with_writer(writer: W, pretty: bool) -> Self {
        Self { writer, pretty }
    }
}

impl<W> ExportSink for ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        NAME
    }

    async fn open(&mut self) -> Result<(), ExporterError> {
        Ok(())
    }

    async fn write_batch(&mut self, batch: Vec<Arc<WriteMsg>>) -> Result<usize, ExporterError> {
        let mut out = String::new();
        let mut rendered = 0;
        for msg in &batch {
            match render_message(msg, self.pretty) {
                Ok(block) => {
                    out.push_str(&block);
                    rendered += 1;
                }
                Err(e) => tracing::warn!(error = %e, "failed to render drop alert"),
            }
        }

        self.writer
            .write_all(out.as_bytes())
            .await
            .map_err(|e| ExporterError::io(NAME, e))?;
        self.writer
            .flush()
            .await
            .map_err(|e| ExporterError::io(NAME, e))?;
        Ok(rendered)
    }

    async fn close(&mut self) -> Result<(), ExporterError> {
        self.writer
            .flush()
            .await
            .map_err(|e| ExporterError::io(NAME, e))
    }
}

/// 메시지 하나를 텍스트 블록으로 변환합니다. 블록은 빈 줄로 끝납니다.
pub fn render_message(msg: &WriteMsg, pretty: bool) -> Result<String, ExporterError> {
    let alert = &msg.alert;
    let mut out = String::with_capacity(256);

    // String에 대한 write!는 실패하지 않음
    let _ = match alert.trap_group.as_deref() {
        Some(group) => writeln!(out, "drop at: {} ({group})", alert.drop_point()),
        None => writeln!(out, "drop at: {}", alert.drop_point()),
    };
    let _ = writeln!(out, "origin: {}", alert.origin);
    let _ = writeln!(
        out,
        "input port ifindex: {}",
        alert
            .port_ifindex()
            .map_or_else(|| "-".to_owned(), |i| i.to_string())
    );
    let _ = writeln!(out, "input port name: {}", alert.port_name().unwrap_or("-"));

    let timestamp: DateTime<Utc> = alert.timestamp.into();
    let _ = writeln!(
        out,
        "timestamp: {}",
        timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
    );
    let _ = writeln!(out, "protocol: {:#x}", alert.packet.protocol);
    let _ = writeln!(out, "length: {}", alert.packet.captured_len);
    let _ = writeln!(out, "original length: {}", alert.packet.original_len);
    if let Some(pc) = alert.pc {
        let _ = writeln!(out, "pc: {pc:#x}");
    }
    if let Some(reason) = alert.reason.as_deref() {
        let _ = writeln!(out, "reason: {reason}");
    }

    if let Some(packet) = &msg.packet {
        let json = if pretty {
            serde_json::to_string_pretty(packet)?
        } else {
            serde_json::to_string(packet)?
        };
        let _ = writeln!(out, "Packet: {json}");
    }
    out.push('\n');
    Ok(out)
}
