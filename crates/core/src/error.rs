//! 에러 타입 -- 도메인별 에러 정의
//!
//! 각 크레이트는 자체 에러 타입을 정의하고 `From` 구현으로
//! [`DropwatchError`]로 변환하여 크레이트 경계를 넘어 `?`를 사용할 수 있게 합니다.

/// dropwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DropwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인(생명주기) 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 커널 drop monitor 통신 에러
    #[error("netlink error: {0}")]
    Netlink(#[from] NetlinkError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 익스포터 에러
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 한 번 정지된 파이프라인은 재시작할 수 없음
    #[error("pipeline terminated, cannot restart")]
    Terminated,
}

/// 커널 drop monitor 통신 에러
#[derive(Debug, thiserror::Error)]
pub enum NetlinkError {
    /// 커널이 NET_DM 패밀리를 제공하지 않음
    #[error("generic netlink family '{0}' is not available")]
    FamilyUnavailable(String),

    /// 소켓 생성/송수신 실패
    #[error("netlink connection failed: {0}")]
    Connection(String),

    /// 멀티캐스트 그룹 가입 실패
    #[error("multicast subscription failed: {0}")]
    Subscription(String),

    /// 커널이 명령을 거부함
    #[error("command {command} rejected by kernel (errno {errno})")]
    Command { command: String, errno: i32 },

    /// 현재 상태에서 허용되지 않는 동작
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 파싱 실패
    #[error("parse failed at offset {offset}: {reason}")]
    Failed { offset: usize, reason: String },
}

/// 익스포터 에러
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// 익스포터 설정 오류
    #[error("exporter '{exporter}' misconfigured: {reason}")]
    Config { exporter: String, reason: String },

    /// 출력 대상 I/O 실패
    #[error("exporter '{exporter}' io failure: {reason}")]
    Io { exporter: String, reason: String },

    /// 직렬화 실패
    #[error("serialization failed: {0}")]
    Serialize(String),
}
