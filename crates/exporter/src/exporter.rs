//! 익스포터 생명주기 -- 출력 싱크를 큐와 처리 루프로 감쌉니다.
//!
//! [`Exporter`]는 core의 [`Pipeline`] trait을 구현하여 데몬에서
//! 다른 컴포넌트와 동일한 생명주기(start/stop/health_check)로 관리됩니다.
//!
//! # 상태 전이
//! ```text
//! Initialized ──start──▶ Running ──stop──▶ Draining ──▶ Stopped
//! ```
//!
//! # 처리 루프
//! - 스트리밍 싱크 (`flush_interval() == None`): 큐 알림마다 쌓인 메시지를 출력
//! - 배치 싱크: 주기 타이머마다 큐 전체를 한 배치로 출력 (첫 틱은 한 주기 뒤)
//!
//! 정지 시 [`StopPolicy`]에 따라 남은 메시지를 출력하거나 버린 뒤
//! 싱크의 `close()`를 정확히 한 번 호출합니다.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dropwatch_core::error::{DropwatchError, PipelineError};
use dropwatch_core::event::WriteMsg;
use dropwatch_core::metrics as m;
use dropwatch_core::pipeline::{HealthStatus, Pipeline};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ExporterSettings, StopPolicy};
use crate::error::ExporterError;
use crate::queue::ExportQueue;
use crate::router::ExportHandle;

/// 출력 싱크 capability
///
/// 새 출력 대상을 추가할 때 이 trait만 구현하면 라우터와 생명주기는
/// 그대로 재사용됩니다.
pub trait ExportSink: Send + Sync + 'static {
    /// 로그/메트릭에 쓰이는 이름
    fn name(&self) -> &'static str;

    /// 배치 전송 주기. `None`이면 메시지가 들어올 때마다 출력합니다.
    fn flush_interval(&self) -> Option<Duration> {
        None
    }

    /// 출력 리소스를 준비합니다. 실패하면 익스포터가 시작되지 않습니다.
    fn open(&mut self) -> impl Future<Output = Result<(), ExporterError>> + Send;

    /// 메시지 묶음을 출력하고 성공한 메시지 수를 반환합니다.
    fn write_batch(
        &mut self,
        batch: Vec<Arc<WriteMsg>>,
    ) -> impl Future<Output = Result<usize, ExporterError>> + Send;

    /// 출력 리소스를 정리합니다.
    fn close(&mut self) -> impl Future<Output = Result<(), ExporterError>> + Send;
}

/// 익스포터 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterState {
    /// 생성됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지 중 (남은 메시지 처리)
    Draining,
    /// 정지됨 (재시작 불가)
    Stopped,
}

impl fmt::Display for ExporterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        })
    }
}

/// 익스포터 카운터
#[derive(Debug)]
pub struct ExporterStats {
    name: &'static str,
    written: AtomicU64,
    write_errors: AtomicU64,
    discarded: AtomicU64,
}

impl ExporterStats {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            written: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// 출력에 성공한 메시지 수
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// 출력 실패 횟수
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// 정지 시 버려진 메시지 수
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    fn record_written(&self, count: usize) {
        let count = count as u64;
        self.written.fetch_add(count, Ordering::Relaxed);
        metrics::counter!(m::EXPORTER_WRITTEN_TOTAL, m::LABEL_EXPORTER => self.name)
            .increment(count);
    }

    fn record_errors(&self, count: usize) {
        let count = count as u64;
        self.write_errors.fetch_add(count, Ordering::Relaxed);
        metrics::counter!(m::EXPORTER_WRITE_ERRORS_TOTAL, m::LABEL_EXPORTER => self.name)
            .increment(count);
    }

    fn record_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }
}

struct Worker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// 싱크 하나를 구동하는 익스포터
///
/// # 사용 예시
/// ```ignore
/// let mut exporter = Exporter::new(PcapSink::new(&config), config.settings.clone());
/// router.add(exporter.handle());
/// exporter.start().await?;
/// ```
pub struct Exporter<S: ExportSink> {
    name: &'static str,
    settings: ExporterSettings,
    state: ExporterState,
    queue: ExportQueue,
    sink: Option<S>,
    worker: Option<Worker>,
    stats: Arc<ExporterStats>,
}

impl<S: ExportSink> Exporter<S> {
    /// 새 익스포터를 생성합니다. 큐는 바로 만들어지지만 출력 리소스는
    /// `start`에서 준비됩니다.
    pub fn new(sink: S, settings: ExporterSettings) -> Self {
        let name = sink.name();
        let queue = ExportQueue::new(name, settings.queue_capacity, settings.drop_policy);
        Self {
            name,
            settings,
            state: ExporterState::Initialized,
            queue,
            sink: Some(sink),
            worker: None,
            stats: Arc::new(ExporterStats::new(name)),
        }
    }

    /// 익스포터 이름
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 현재 상태
    pub fn state(&self) -> ExporterState {
        self.state
    }

    /// 카운터
    pub fn stats(&self) -> Arc<ExporterStats> {
        Arc::clone(&self.stats)
    }

    /// 라우터에 등록할 큐 핸들
    ///
    /// 시작 전에 들어온 메시지는 시작 후 출력되고, 정지 후에는 거부됩니다.
    pub fn handle(&self) -> ExportHandle {
        ExportHandle::new(self.queue.clone())
    }

    /// 큐 사용률
    pub fn queue_utilization(&self) -> f64 {
        self.queue.utilization()
    }
}

impl<S: ExportSink> Pipeline for Exporter<S> {
    async fn start(&mut self) -> Result<(), DropwatchError> {
        match self.state {
            ExporterState::Initialized => {}
            ExporterState::Running | ExporterState::Draining => {
                return Err(PipelineError::AlreadyRunning.into());
            }
            ExporterState::Stopped => return Err(PipelineError::Terminated.into()),
        }

        let Some(mut sink) = self.sink.take() else {
            return Err(PipelineError::InitFailed(format!("{} sink missing", self.name)).into());
        };
        if let Err(e) = sink.open().await {
            // 재시도할 수 있도록 싱크를 되돌려 둠
            self.sink = Some(sink);
            return Err(e.into());
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            sink,
            self.queue.clone(),
            cancel.clone(),
            Arc::clone(&self.stats),
            self.settings.on_stop,
        ));

        self.worker = Some(Worker { cancel, task });
        self.state = ExporterState::Running;
        info!(
            exporter = self.name,
            queue_capacity = self.settings.queue_capacity,
            drop_policy = ?self.settings.drop_policy,
            "exporter started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DropwatchError> {
        if self.state != ExporterState::Running {
            return Ok(());
        }
        let Some(Worker { cancel, mut task }) = self.worker.take() else {
            self.state = ExporterState::Stopped;
            return Ok(());
        };

        self.state = ExporterState::Draining;
        info!(
            exporter = self.name,
            pending = self.queue.len(),
            on_stop = ?self.settings.on_stop,
            "stopping exporter"
        );
        self.queue.close();
        cancel.cancel();

        match tokio::time::timeout(self.settings.stop_timeout, &mut task).await {
            Ok(Ok(())) => info!(exporter = self.name, "exporter stopped"),
            Ok(Err(e)) => error!(exporter = self.name, error = %e, "exporter task failed"),
            Err(_) => {
                task.abort();
                warn!(
                    exporter = self.name,
                    timeout_ms = self.settings.stop_timeout.as_millis() as u64,
                    "exporter did not stop in time, aborted"
                );
            }
        }

        self.state = ExporterState::Stopped;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            ExporterState::Running => {
                let utilization = self.queue_utilization();
                if utilization > 0.9 {
                    HealthStatus::Degraded(format!(
                        "queue utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            ExporterState::Draining => HealthStatus::Degraded("draining".to_owned()),
            ExporterState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            ExporterState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

impl<S: ExportSink> Drop for Exporter<S> {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            self.queue.close();
            worker.cancel.cancel();
        }
    }
}

async fn run_loop<S: ExportSink>(
    mut sink: S,
    queue: ExportQueue,
    cancel: CancellationToken,
    stats: Arc<ExporterStats>,
    on_stop: StopPolicy,
) {
    let name = sink.name();

    match sink.flush_interval() {
        Some(period) => {
            debug!(exporter = name, interval_ms = period.as_millis() as u64, "batched export loop");
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => flush(&mut sink, &queue, &stats).await,
                }
            }
        }
        None => {
            debug!(exporter = name, "streaming export loop");
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = queue.notified() => flush(&mut sink, &queue, &stats).await,
                }
            }
        }
    }

    match on_stop {
        StopPolicy::Drain => flush(&mut sink, &queue, &stats).await,
        StopPolicy::Discard => {
            let remaining = queue.drain_all().len();
            if remaining > 0 {
                stats.record_discarded(remaining);
                info!(exporter = name, discarded = remaining, "discarded pending messages");
            }
        }
    }

    if let Err(e) = sink.close().await {
        warn!(exporter = name, error = %e, "failed to close exporter output");
    }
}

async fn flush<S: ExportSink>(sink: &mut S, queue: &ExportQueue, stats: &ExporterStats) {
    let batch = queue.drain_all();
    metrics::gauge!(m::EXPORTER_QUEUE_DEPTH, m::LABEL_EXPORTER => sink.name())
        .set(f64::from(u32::try_from(queue.len()).unwrap_or(u32::MAX)));
    if batch.is_empty() {
        return;
    }

    let count = batch.len();
    match sink.write_batch(batch).await {
        Ok(written) => {
            stats.record_written(written);
            if written < count {
                stats.record_errors(count - written);
            }
        }
        Err(e) => {
            stats.record_errors(1);
            warn!(exporter = sink.name(), batch = count, error = %e, "export failed, batch lost");
        }
    }
}
