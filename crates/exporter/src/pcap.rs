//! pcap 익스포터 -- 드롭된 패킷을 classic pcap 파일로 기록
//!
//! 파일은 시작 시 새로 생성되고 글로벌 헤더가 기록됩니다.
//! 헤더와 레코드 직렬화는 `pcap-file`의 [`PcapWriter`]가 메모리 버퍼에 수행하고,
//! 완성된 레코드 단위로만 파일에 씁니다.
//!
//! # 레코드 형식 (little-endian)
//! ```text
//! ts_sec(u32) | ts_usec(u32) | incl_len(u32) | orig_len(u32) | payload[incl_len]
//! ```
//!
//! 파일 쓰기가 한 번 실패하면 이후 레코드가 어긋나므로 싱크는 실패 상태가 되어
//! 더 이상 레코드를 덧붙이지 않습니다.
//!
//! classic pcap에는 인터페이스 인덱스 필드가 없어 ifindex는 trace 로그로만 남깁니다.

use std::path::PathBuf;
use std::sync::Arc;

use dropwatch_core::event::WriteMsg;
use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use pcap_file::{DataLink, Endianness, TsResolution};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::PcapConfig;
use crate::error::ExporterError;
use crate::exporter::ExportSink;

/// 익스포터 이름
pub const NAME: &str = "pcap";

/// pcap 매직 넘버 (마이크로초 타임스탬프)
pub const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
/// 레코드 최대 캡처 길이
pub const PCAP_SNAPLEN: u32 = 65_536;
/// 글로벌 헤더 길이
pub const GLOBAL_HEADER_LEN: usize = 24;
/// 레코드 헤더 길이
pub const RECORD_HEADER_LEN: usize = 16;

/// 캡처 파일 글로벌 헤더 (v2.4, Ethernet, 마이크로초)
pub fn capture_header() -> PcapHeader {
    PcapHeader {
        version_major: 2,
        version_minor: 4,
        ts_correction: 0,
        ts_accuracy: 0,
        snaplen: PCAP_SNAPLEN,
        datalink: DataLink::ETHERNET,
        ts_resolution: TsResolution::MicroSecond,
        endianness: Endianness::Little,
    }
}

/// 메모리 버퍼 위의 pcap 인코더
pub struct PcapEncoder {
    writer: PcapWriter<Vec<u8>>,
}

impl PcapEncoder {
    /// 인코더를 만듭니다. 글로벌 헤더는 [`take_header`](Self::take_header)로 꺼냅니다.
    pub fn new() -> Result<Self, ExporterError> {
        let writer = PcapWriter::with_header(Vec::with_capacity(GLOBAL_HEADER_LEN), capture_header())
            .map_err(|e| ExporterError::io(NAME, e))?;
        Ok(Self { writer })
    }

    /// 버퍼에 쌓인 글로벌 헤더를 꺼냅니다.
    pub fn take_header(&mut self) -> Vec<u8> {
        std::mem::take(self.writer.get_mut())
    }

    /// 메시지 하나를 완성된 pcap 레코드(헤더 + 페이로드)로 인코딩합니다.
    ///
    /// 페이로드는 snaplen으로 잘리고, `orig_len`은 원래 길이와 캡처 길이 중 큰 값입니다.
    pub fn encode(&mut self, msg: &WriteMsg) -> Result<Vec<u8>, ExporterError> {
        let alert = &msg.alert;
        let payload = &alert.packet.payload;
        let data = &payload[..payload.len().min(PCAP_SNAPLEN as usize)];
        let orig_len = alert
            .packet
            .original_len
            .max(u32::try_from(payload.len()).unwrap_or(u32::MAX));

        let packet = PcapPacket::new(alert.since_epoch(), orig_len, data);
        let result = self.writer.write_packet(&packet);
        let record = std::mem::take(self.writer.get_mut());
        result.map_err(|e| ExporterError::io(NAME, e))?;
        Ok(record)
    }
}

/// pcap 파일 싱크
pub struct PcapSink {
    path: PathBuf,
    flush_each: bool,
    writer: Option<BufWriter<File>>,
    records: u64,
    failed: bool,
}

impl PcapSink {
    /// 설정으로 싱크를 생성합니다. 파일은 `open`에서 생성됩니다.
    pub fn new(config: &PcapConfig) -> Self {
        Self {
            path: config.file_name.clone(),
            flush_each: config.flush_each,
            writer: None,
            records: 0,
            failed: false,
        }
    }

    /// 지금까지 기록한 레코드 수
    pub fn records(&self) -> u64 {
        self.records
    }

    /// 파일 쓰기 실패로 기록을 멈췄는지 여부
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn write_failed(&mut self, e: impl std::fmt::Display) -> ExporterError {
        self.failed = true;
        tracing::error!(
            path = %self.path.display(),
            records = self.records,
            error = %e,
            "pcap write failed, capture file closed for further records"
        );
        ExporterError::io(NAME, format!("write to {}: {e}", self.path.display()))
    }
}

impl ExportSink for PcapSink {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn open(&mut self) -> Result<(), ExporterError> {
        let file = File::create(&self.path).await.map_err(|e| {
            ExporterError::io(NAME, format!("cannot create {}: {e}", self.path.display()))
        })?;
        let header = PcapEncoder::new()?.take_header();
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&header)
            .await
            .map_err(|e| ExporterError::io(NAME, e))?;
        writer.flush().await.map_err(|e| ExporterError::io(NAME, e))?;

        tracing::info!(path = %self.path.display(), "pcap capture file created");
        self.writer = Some(writer);
        self.records = 0;
        self.failed = false;
        Ok(())
    }

    async fn write_batch(&mut self, batch: Vec<Arc<WriteMsg>>) -> Result<usize, ExporterError> {
        if self.failed {
            return Err(ExporterError::io(NAME, "capture file is in a failed state"));
        }
        let mut encoder = PcapEncoder::new()?;
        encoder.take_header();
        let Some(mut writer) = self.writer.take() else {
            return Err(ExporterError::io(NAME, "capture file is not open"));
        };

        let mut written = 0;
        for msg in &batch {
            let alert = &msg.alert;
            tracing::trace!(
                ifindex = alert.port_ifindex(),
                drop_point = alert.drop_point(),
                "writing pcap record"
            );
            let record = match encoder.encode(msg) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode pcap record");
                    continue;
                }
            };
            if let Err(e) = writer.write_all(&record).await {
                return Err(self.write_failed(e));
            }
            written += 1;
            self.records += 1;
        }

        if self.flush_each {
            if let Err(e) = writer.flush().await {
                return Err(self.write_failed(e));
            }
        }
        self.writer = Some(writer);
        Ok(written)
    }

    async fn close(&mut self) -> Result<(), ExporterError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await.map_err(|e| ExporterError::io(NAME, e))?;
            writer
                .into_inner()
                .sync_all()
                .await
                .map_err(|e| ExporterError::io(NAME, e))?;
            tracing::info!(
                path = %self.path.display(),
                records = self.records,
                "pcap capture file closed"
            );
        }
        Ok(())
    }
}
