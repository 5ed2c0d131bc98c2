//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `dropwatch_`
//! - 컴포넌트: `monitor_`, `dissector_`, `exporter_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(dropwatch_core::metrics::MONITOR_ALERTS_RECEIVED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 익스포터 이름 레이블 키 (console, pcap, telegraf)
pub const LABEL_EXPORTER: &str = "exporter";

/// 드롭 발생 위치 레이블 키 (software, hardware, unknown)
pub const LABEL_ORIGIN: &str = "origin";

/// 패킷 분류 레이블 키 (Unknown, Ethernet, IP, Transport)
pub const LABEL_PACKET_TYPE: &str = "packet_type";

// ─── Drop Monitor 메트릭 ────────────────────────────────────────────

/// Monitor: 수신한 드롭 알림 수 (counter, label: origin)
pub const MONITOR_ALERTS_RECEIVED_TOTAL: &str = "dropwatch_monitor_alerts_received_total";

/// Monitor: 디코딩 실패 메시지 수 (counter)
pub const MONITOR_DECODE_ERRORS_TOTAL: &str = "dropwatch_monitor_decode_errors_total";

/// Monitor: 소켓 버퍼 오버런(ENOBUFS) 횟수 (counter)
pub const MONITOR_SOCKET_OVERRUNS_TOTAL: &str = "dropwatch_monitor_socket_overruns_total";

// ─── Dissector 메트릭 ───────────────────────────────────────────────

/// Dissector: 분석한 패킷 수 (counter, label: packet_type)
pub const DISSECTOR_PACKETS_TOTAL: &str = "dropwatch_dissector_packets_total";

/// Dissector: 헤더 구조 오류 수 (counter)
pub const DISSECTOR_MALFORMED_TOTAL: &str = "dropwatch_dissector_malformed_total";

// ─── Exporter 메트릭 ────────────────────────────────────────────────

/// Exporter: 큐에 들어간 메시지 수 (counter, label: exporter)
pub const EXPORTER_ENQUEUED_TOTAL: &str = "dropwatch_exporter_enqueued_total";

/// Exporter: 큐 오버플로우로 드롭된 메시지 수 (counter, label: exporter)
pub const EXPORTER_DROPPED_TOTAL: &str = "dropwatch_exporter_dropped_total";

/// Exporter: 출력에 성공한 메시지 수 (counter, label: exporter)
pub const EXPORTER_WRITTEN_TOTAL: &str = "dropwatch_exporter_written_total";

/// Exporter: 출력 실패 횟수 (counter, label: exporter)
pub const EXPORTER_WRITE_ERRORS_TOTAL: &str = "dropwatch_exporter_write_errors_total";

/// Exporter: 현재 큐 길이 (gauge, label: exporter)
pub const EXPORTER_QUEUE_DEPTH: &str = "dropwatch_exporter_queue_depth";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "dropwatch_daemon_uptime_seconds";

/// Daemon: 실행 중인 익스포터 수 (gauge)
pub const DAEMON_EXPORTERS_RUNNING: &str = "dropwatch_daemon_exporters_running";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Drop Monitor
    describe_counter!(
        MONITOR_ALERTS_RECEIVED_TOTAL,
        "Total number of packet drop alerts decoded from the kernel"
    );
    describe_counter!(
        MONITOR_DECODE_ERRORS_TOTAL,
        "Total number of netlink messages that failed to decode"
    );
    describe_counter!(
        MONITOR_SOCKET_OVERRUNS_TOTAL,
        "Total number of netlink socket receive buffer overruns"
    );

    // Dissector
    describe_counter!(
        DISSECTOR_PACKETS_TOTAL,
        "Total number of dropped packet payloads dissected, by packet type"
    );
    describe_counter!(
        DISSECTOR_MALFORMED_TOTAL,
        "Total number of payloads with a malformed protocol header"
    );

    // Exporter
    describe_counter!(
        EXPORTER_ENQUEUED_TOTAL,
        "Total number of messages accepted into an exporter queue"
    );
    describe_counter!(
        EXPORTER_DROPPED_TOTAL,
        "Total number of messages dropped by exporter queue overflow policy"
    );
    describe_counter!(
        EXPORTER_WRITTEN_TOTAL,
        "Total number of messages written by an exporter"
    );
    describe_counter!(
        EXPORTER_WRITE_ERRORS_TOTAL,
        "Total number of exporter write or send failures"
    );
    describe_gauge!(
        EXPORTER_QUEUE_DEPTH,
        "Current number of messages waiting in an exporter queue"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "dropwatch daemon uptime in seconds");
    describe_gauge!(
        DAEMON_EXPORTERS_RUNNING,
        "Number of exporters currently running"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        MONITOR_ALERTS_RECEIVED_TOTAL,
        MONITOR_DECODE_ERRORS_TOTAL,
        MONITOR_SOCKET_OVERRUNS_TOTAL,
        DISSECTOR_PACKETS_TOTAL,
        DISSECTOR_MALFORMED_TOTAL,
        EXPORTER_ENQUEUED_TOTAL,
        EXPORTER_DROPPED_TOTAL,
        EXPORTER_WRITTEN_TOTAL,
        EXPORTER_WRITE_ERRORS_TOTAL,
        EXPORTER_QUEUE_DEPTH,
        DAEMON_UPTIME_SECONDS,
        DAEMON_EXPORTERS_RUNNING,
    ];

    #[test]
    fn all_metrics_start_with_dropwatch_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("dropwatch_"),
                "Metric '{}' does not start with 'dropwatch_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES
            .iter()
            .filter(|n| !n.ends_with("_depth") && !n.ends_with("_seconds") && !n.ends_with("_running"))
        {
            assert!(name.ends_with("_total"), "Counter '{}' must end with _total", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더 없이 호출해도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_EXPORTER, LABEL_ORIGIN, LABEL_PACKET_TYPE] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
