//! 익스포터 에러 타입
//!
//! [`ExporterError`]는 익스포터 구성, 출력 I/O, 직렬화 중 발생하는 에러를 표현합니다.
//! `From<ExporterError> for DropwatchError` 변환이 구현되어 있어
//! 데몬에서 `?` 연산자로 전파할 수 있습니다.

use dropwatch_core::error::{DropwatchError, ExportError};

/// 익스포터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// 설정 섹션 값이 잘못됨 (해당 익스포터만 비활성화)
    #[error("exporter '{exporter}' config error: {reason}")]
    Config {
        /// 익스포터 이름
        exporter: &'static str,
        /// 에러 사유
        reason: String,
    },

    /// 출력 대상 I/O 실패 (파일 생성, 연결, 쓰기)
    #[error("exporter '{exporter}' io error: {reason}")]
    Io {
        /// 익스포터 이름
        exporter: &'static str,
        /// 에러 사유
        reason: String,
    },

    /// 레코드 직렬화 실패
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ExporterError {
    pub(crate) fn config(exporter: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            exporter,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(exporter: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Io {
            exporter,
            reason: reason.to_string(),
        }
    }
}

impl From<ExporterError> for DropwatchError {
    fn from(err: ExporterError) -> Self {
        let export = match err {
            ExporterError::Config { exporter, reason } => ExportError::Config {
                exporter: exporter.to_owned(),
                reason,
            },
            ExporterError::Io { exporter, reason } => ExportError::Io {
                exporter: exporter.to_owned(),
                reason,
            },
            ExporterError::Serialize(e) => ExportError::Serialize(e.to_string()),
        };
        DropwatchError::Export(export)
    }
}
