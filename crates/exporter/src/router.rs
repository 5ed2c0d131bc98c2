//! 익스포트 라우터 -- 메시지 하나를 모든 익스포터 큐에 전달
//!
//! ```text
//! AlertProcessor ──route(Arc<WriteMsg>)──┬──▶ [queue] console
//!                                        ├──▶ [queue] pcap
//!                                        └──▶ [queue] telegraf
//! ```
//!
//! 라우터는 대기하지 않습니다. 느리거나 멈춘 익스포터는 자신의 큐만 채우고,
//! 오버플로우 정책에 따라 자신의 메시지만 잃습니다.

use std::sync::Arc;

use dropwatch_core::event::WriteMsg;

use crate::queue::{ExportQueue, PushOutcome};

/// 실행 중인 익스포터의 큐 핸들
#[derive(Debug, Clone)]
pub struct ExportHandle {
    queue: ExportQueue,
}

impl ExportHandle {
    pub(crate) fn new(queue: ExportQueue) -> Self {
        Self { queue }
    }

    /// 익스포터 이름
    pub fn name(&self) -> &'static str {
        self.queue.name()
    }

    /// 메시지를 큐에 넣습니다.
    pub fn offer(&self, msg: Arc<WriteMsg>) -> PushOutcome {
        self.queue.push(msg)
    }

    /// 현재 큐 길이
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// 오버플로우로 드롭된 메시지 수
    pub fn dropped_count(&self) -> u64 {
        self.queue.dropped_count()
    }

    /// 익스포터가 정지되어 큐가 닫혔는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

/// `route` 한 번의 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteReport {
    /// 메시지를 받은 익스포터 수 (밀어내기 포함)
    pub delivered: usize,
    /// 오버플로우로 메시지가 버려진 익스포터 수
    pub dropped: usize,
    /// 정지되어 거부한 익스포터 수
    pub closed: usize,
}

/// 익스포터 팬아웃 라우터
#[derive(Debug, Clone, Default)]
pub struct ExportRouter {
    handles: Vec<ExportHandle>,
}

impl ExportRouter {
    /// 빈 라우터를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 익스포터 핸들을 등록합니다.
    pub fn add(&mut self, handle: ExportHandle) {
        tracing::debug!(exporter = handle.name(), "exporter registered with router");
        self.handles.push(handle);
    }

    /// 메시지를 모든 익스포터 큐에 전달합니다.
    pub fn route(&self, msg: Arc<WriteMsg>) -> RouteReport {
        let mut report = RouteReport::default();
        for handle in &self.handles {
            match handle.offer(Arc::clone(&msg)) {
                PushOutcome::Enqueued => report.delivered += 1,
                PushOutcome::DroppedOldest => {
                    report.delivered += 1;
                    report.dropped += 1;
                }
                PushOutcome::Rejected => report.dropped += 1,
                PushOutcome::Closed => report.closed += 1,
            }
        }
        report
    }

    /// 등록된 익스포터 수
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// 등록된 익스포터가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 등록된 익스포터 이름 목록
    pub fn names(&self) -> Vec<&'static str> {
        self.handles.iter().map(ExportHandle::name).collect()
    }

    /// 등록된 핸들
    pub fn handles(&self) -> &[ExportHandle] {
        &self.handles
    }
}
