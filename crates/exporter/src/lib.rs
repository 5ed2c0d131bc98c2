#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`queue`]: 익스포터별 유한 큐와 오버플로우 정책
//! - [`router`]: 메시지 팬아웃 (`ExportRouter`)
//! - [`exporter`]: 싱크 capability trait과 생명주기 러너 (`Exporter<S>`)
//! - [`console`], [`pcap`], [`telegraf`]: 출력 싱크
//! - [`config`]: 익스포터 설정
//! - [`error`]: 에러 타입

pub mod config;
pub mod console;
pub mod error;
pub mod exporter;
pub mod pcap;
pub mod queue;
pub mod router;
pub mod telegraf;

// --- 주요 타입 re-export ---

pub use config::{
    ConsoleConfig, DropPolicy, ExporterSettings, PcapConfig, StopPolicy, TelegrafConfig,
};
pub use console::ConsoleSink;
pub use error::ExporterError;
pub use exporter::{ExportSink, Exporter, ExporterState, ExporterStats};
pub use pcap::PcapSink;
pub use queue::{ExportQueue, PushOutcome};
pub use router::{ExportHandle, ExportRouter, RouteReport};
pub use telegraf::{TelegrafRecord, TelegrafSink};
