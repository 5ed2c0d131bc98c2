//! 파이프라인 trait -- 컴포넌트 생명주기 정의
//!
//! 익스포터처럼 독립적으로 시작/정지되는 컴포넌트는 [`Pipeline`]을 구현합니다.
//! 데몬은 [`DynPipeline`] trait 객체로 서로 다른 구현을 한 레지스트리에 담아
//! 순서대로 시작하고 역순으로 정지합니다.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::DropwatchError;

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 컴포넌트 생명주기 trait
///
/// - `start`: 리소스를 획득하고 백그라운드 태스크를 스폰합니다.
/// - `stop`: 태스크를 정리합니다. 실행 중이 아닐 때는 아무 것도 하지 않습니다.
/// - `health_check`: 현재 상태를 보고합니다.
pub trait Pipeline: Send {
    /// 파이프라인을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), DropwatchError>> + Send;

    /// 파이프라인을 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), DropwatchError>> + Send;

    /// 현재 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// [`Pipeline`]의 object-safe 버전
///
/// `Pipeline`을 구현하는 모든 타입에 대해 blanket 구현이 제공됩니다.
pub trait DynPipeline: Send + Sync {
    /// 파이프라인을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), DropwatchError>>;

    /// 파이프라인을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), DropwatchError>>;

    /// 현재 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Pipeline + Sync> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), DropwatchError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), DropwatchError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

/// 컴포넌트 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작하지만 성능 저하 (사유 포함)
    Degraded(String),
    /// 동작 불가 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 성능 저하 상태인지 확인합니다.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}
