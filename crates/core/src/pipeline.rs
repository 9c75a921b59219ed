//! 파이프라인 trait — 모듈 생명주기 정의
//!
//! 스캔/결과 파이프라인은 이 trait을 구현하여 `sbomwatch-daemon`에서
//! 동일한 생명주기(start/stop/health_check)로 관리됩니다.

use std::future::Future;

use crate::error::SbomwatchError;

/// 파이프라인 건강 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 동작하지만 주의 필요 (사유 포함)
    Degraded(String),
    /// 동작 불가 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 반환합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 반환합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 파이프라인 생명주기 trait
///
/// 상태 전환: `Initialized` → `start()` → `Running` → `stop()` → `Stopped`.
/// 재시작이 필요하면 빌더로 새 인스턴스를 생성해야 합니다.
pub trait Pipeline: Send {
    /// 파이프라인을 시작합니다 (워커 태스크 스폰).
    fn start(&mut self) -> impl Future<Output = Result<(), SbomwatchError>> + Send;

    /// 파이프라인을 정지합니다 (워커 태스크 취소 및 합류).
    fn stop(&mut self) -> impl Future<Output = Result<(), SbomwatchError>> + Send;

    /// 현재 건강 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Healthy.is_unhealthy());
    }

    #[test]
    fn degraded_is_neither() {
        let status = HealthStatus::Degraded("queue backed up".to_owned());
        assert!(!status.is_healthy());
        assert!(!status.is_unhealthy());
    }

    #[test]
    fn unhealthy_predicate() {
        let status = HealthStatus::Unhealthy("stopped".to_owned());
        assert!(status.is_unhealthy());
    }
}
