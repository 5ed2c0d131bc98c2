//! 익스포터 큐 -- 익스포터별 유한 버퍼
//!
//! [`ExportQueue`]는 라우터(생산자)와 익스포터 처리 루프(소비자)가 공유하는
//! 유한 FIFO 큐입니다. `push`는 절대 대기하지 않습니다.
//!
//! # 오버플로우 정책
//! 큐가 가득 찬 경우:
//! - [`DropPolicy::Oldest`]: 가장 오래된 메시지를 드롭하고 새 메시지를 넣음
//! - [`DropPolicy::Newest`]: 새 메시지를 거부
//!
//! 닫힌 큐는 새 메시지를 받지 않지만, 남은 메시지는 계속 꺼낼 수 있습니다.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use dropwatch_core::event::WriteMsg;
use dropwatch_core::metrics as m;
use tokio::sync::Notify;

use crate::config::DropPolicy;

/// `push` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// 큐에 들어감
    Enqueued,
    /// 큐가 가득 차 가장 오래된 메시지를 밀어내고 들어감
    DroppedOldest,
    /// 큐가 가득 차 거부됨
    Rejected,
    /// 큐가 닫혀 거부됨
    Closed,
}

impl PushOutcome {
    /// 새 메시지가 큐에 들어갔는지 확인합니다.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Enqueued | Self::DroppedOldest)
    }

    /// 이 push로 메시지 하나가 버려졌는지 확인합니다.
    pub fn is_drop(&self) -> bool {
        matches!(self, Self::DroppedOldest | Self::Rejected)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Arc<WriteMsg>>,
    closed: bool,
    dropped: u64,
    total_received: u64,
}

#[derive(Debug)]
struct Shared {
    name: &'static str,
    capacity: usize,
    drop_policy: DropPolicy,
    state: Mutex<QueueState>,
    notify: Notify,
}

/// 익스포터별 유한 큐
///
/// 복제본은 같은 큐를 가리킵니다.
#[derive(Debug, Clone)]
pub struct ExportQueue {
    shared: Arc<Shared>,
}

impl ExportQueue {
    /// 새 큐를 생성합니다. `name`은 로그와 메트릭 레이블에 쓰입니다.
    pub fn new(name: &'static str, capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                capacity: capacity.max(1),
                drop_policy,
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity.clamp(1, 4096)),
                    ..Default::default()
                }),
                notify: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// 메시지를 큐에 넣습니다. 대기하지 않습니다.
    pub fn push(&self, msg: Arc<WriteMsg>) -> PushOutcome {
        let name = self.shared.name;
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            state.total_received += 1;

            if state.items.len() >= self.shared.capacity {
                state.dropped += 1;
                match self.shared.drop_policy {
                    DropPolicy::Oldest => {
                        state.items.pop_front();
                        state.items.push_back(msg);
                        tracing::warn!(
                            exporter = name,
                            dropped = state.dropped,
                            capacity = self.shared.capacity,
                            "export queue full, dropped oldest message"
                        );
                        PushOutcome::DroppedOldest
                    }
                    DropPolicy::Newest => {
                        tracing::warn!(
                            exporter = name,
                            dropped = state.dropped,
                            capacity = self.shared.capacity,
                            "export queue full, rejected new message"
                        );
                        PushOutcome::Rejected
                    }
                }
            } else {
                state.items.push_back(msg);
                PushOutcome::Enqueued
            }
        };

        if outcome.is_drop() {
            metrics::counter!(m::EXPORTER_DROPPED_TOTAL, m::LABEL_EXPORTER => name).increment(1);
        }
        if outcome.is_accepted() {
            metrics::counter!(m::EXPORTER_ENQUEUED_TOTAL, m::LABEL_EXPORTER => name).increment(1);
            self.shared.notify.notify_one();
        }
        outcome
    }

    /// 큐의 모든 메시지를 FIFO 순서로 꺼냅니다.
    ///
    /// 큐가 비어있으면 빈 Vec을 반환합니다.
    pub fn drain_all(&self) -> Vec<Arc<WriteMsg>> {
        self.lock().items.drain(..).collect()
    }

    /// 큐를 닫습니다. 이후 `push`는 [`PushOutcome::Closed`]를 반환합니다.
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.notify.notify_one();
    }

    /// 큐가 닫혔는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// 새 메시지가 들어오거나 큐가 닫힐 때까지 대기합니다.
    ///
    /// 대기 전에 발생한 알림도 한 번은 보존됩니다.
    pub async fn notified(&self) {
        self.shared.notify.notified().await;
    }

    /// 익스포터 이름
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// 현재 큐 길이
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// 큐가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// 오버플로우 정책
    pub fn drop_policy(&self) -> DropPolicy {
        self.shared.drop_policy
    }

    /// 오버플로우로 드롭된 메시지 수
    pub fn dropped_count(&self) -> u64 {
        self.lock().dropped
    }

    /// 닫히기 전까지 유입된 메시지 수
    pub fn total_received(&self) -> u64 {
        self.lock().total_received
    }

    /// 큐 사용률을 0.0~1.0 범위로 반환합니다.
    pub fn utilization(&self) -> f64 {
        f64::from(u32::try_from(self.len()).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.shared.capacity).unwrap_or(u32::MAX))
    }
}
