//! 파이프라인 trait -- 모듈 생명주기 정의

use std::future::Future;

use crate::error::LogstreamerError;

/// 모듈 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하 (사유 포함)
    Degraded(String),
    /// 비정상 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 시작/정지/헬스체크 생명주기를 가지는 모듈
///
/// daemon은 이 trait만 보고 모듈을 관리합니다.
pub trait Pipeline: Send {
    /// 모듈을 시작합니다. 백그라운드 태스크를 스폰하고 즉시 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogstreamerError>> + Send;

    /// 모듈을 정지합니다. 모든 백그라운드 태스크가 끝날 때까지 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogstreamerError>> + Send;

    /// 현재 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
