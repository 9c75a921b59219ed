//! 영속성 추상화 — 스캔/SBOM/웹훅 스토어 trait
//!
//! 파이프라인과 리퍼는 [`ScanStore`]를 통해서만 저장소에 접근합니다.
//! 실제 데이터베이스 구현은 이 코어의 범위 밖이며,
//! [`memory::MemoryStore`]가 참조 구현으로 제공됩니다.
//!
//! # 동시성 계약
//!
//! 스토어는 파이프라인 둘과 리퍼가 애플리케이션 수준 락 없이
//! 공유합니다. 정합성은 `update_scans_by_status`의 조건부 갱신
//! (`status = from`인 행만)으로 보장합니다. 리퍼가 이미 FAILED로
//! 바꾼 스캔에 대한 늦은 COMPLETED 갱신은 no-op이 됩니다.

use std::future::Future;
use std::time::{Duration, SystemTime};

use crate::error::StoreError;
use crate::types::{Scan, ScanPatch, ScanStatus, StaleScan, Webhook};

pub mod memory;

pub use memory::MemoryStore;

/// 스캔 오케스트레이션이 요구하는 영속성 인터페이스
///
/// 모든 메서드의 future는 `Send`로 선언되어 파이프라인 워커 태스크에서
/// 제네릭하게 사용할 수 있습니다.
pub trait ScanStore: Send + Sync {
    /// SBOM 문서 원문을 조회합니다. 없으면 `None`.
    fn sbom_content(
        &self,
        sbom_id: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// SBOM 표시 이름을 조회합니다. 없으면 `None`.
    fn sbom_display_name(
        &self,
        sbom_id: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// 재스캔 대상 SBOM ID 목록을 조회합니다.
    ///
    /// 스캔 이력이 전혀 없거나, 모든 스캔이 종결 상태이고
    /// `rescan_after`보다 오래된 SBOM이 대상입니다.
    fn sboms_due_for_scan(
        &self,
        rescan_after: Duration,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// 새 PENDING 스캔 행을 생성합니다.
    fn create_pending_scan(
        &self,
        sbom_id: &str,
    ) -> impl Future<Output = Result<Scan, StoreError>> + Send;

    /// 결과가 저장된 가장 최근 COMPLETED 스캔의 지문을 조회합니다.
    ///
    /// `result`와 `result_hash`가 모두 채워진 스캔만 대상입니다.
    /// 없으면 `None` — 호출자는 첫 스캔(baseline)으로 취급합니다.
    fn latest_completed_result_hash(
        &self,
        sbom_id: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// 특정 SBOM의 `from` 상태 스캔을 모두 `to`로 전이시킵니다.
    ///
    /// `patch`가 주어지면 전이와 함께 결과 문서와 지문을 기록합니다.
    /// 갱신된 행 수를 반환합니다. `from` 상태인 행이 없으면 0 (no-op).
    fn update_scans_by_status(
        &self,
        sbom_id: &str,
        from: ScanStatus,
        to: ScanStatus,
        patch: Option<ScanPatch>,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// `cutoff`보다 먼저 생성된 PENDING 스캔 목록을 조회합니다.
    fn stale_pending_scans(
        &self,
        cutoff: SystemTime,
    ) -> impl Future<Output = Result<Vec<StaleScan>, StoreError>> + Send;

    /// 지정한 스캔들을 FAILED로 전이시킵니다.
    ///
    /// PENDING인 행만 대상입니다 (이미 종결된 스캔은 건드리지 않음).
    /// 갱신된 행 수를 반환합니다.
    fn fail_scans(
        &self,
        scan_ids: &[String],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// 등록된 웹훅 전체를 조회합니다.
    fn webhooks(&self) -> impl Future<Output = Result<Vec<Webhook>, StoreError>> + Send;
}
