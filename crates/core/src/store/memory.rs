//! 인메모리 스토어 — [`ScanStore`] 참조 구현
//!
//! 데몬의 기본 백엔드이자 테스트용 스토어입니다. 모든 상태를
//! `tokio::sync::RwLock` 아래의 맵/벡터로 유지하며, 프로세스가
//! 종료되면 사라집니다.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::{Scan, ScanPatch, ScanStatus, SbomRecord, StaleScan, Webhook};

use super::ScanStore;

#[derive(Debug, Default)]
struct Inner {
    sboms: HashMap<String, SbomRecord>,
    scans: Vec<Scan>,
    webhooks: Vec<Webhook>,
}

/// 인메모리 [`ScanStore`] 구현
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// 빈 스토어를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// SBOM을 등록합니다. 같은 ID가 있으면 교체됩니다.
    pub async fn insert_sbom(&self, record: SbomRecord) {
        let mut inner = self.inner.write().await;
        inner.sboms.insert(record.id.clone(), record);
    }

    /// 웹훅을 등록합니다.
    pub async fn insert_webhook(&self, webhook: Webhook) {
        let mut inner = self.inner.write().await;
        inner.webhooks.push(webhook);
    }

    /// 등록된 SBOM 수를 반환합니다.
    pub async fn sbom_count(&self) -> usize {
        self.inner.read().await.sboms.len()
    }

    /// 특정 SBOM의 스캔 이력을 생성순으로 반환합니다 (검사용).
    pub async fn scans_for(&self, sbom_id: &str) -> Vec<Scan> {
        self.inner
            .read()
            .await
            .scans
            .iter()
            .filter(|s| s.sbom_id == sbom_id)
            .cloned()
            .collect()
    }
}

impl ScanStore for MemoryStore {
    async fn sbom_content(&self, sbom_id: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.sboms.get(sbom_id).map(|s| s.content.clone()))
    }

    async fn sbom_display_name(&self, sbom_id: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.sboms.get(sbom_id).map(|s| s.name.clone()))
    }

    async fn sboms_due_for_scan(
        &self,
        rescan_after: Duration,
    ) -> Result<Vec<String>, StoreError> {
        let cutoff = SystemTime::now().checked_sub(rescan_after);
        let inner = self.inner.read().await;

        let due = inner
            .sboms
            .keys()
            .filter(|id| {
                let scans: Vec<&Scan> = inner
                    .scans
                    .iter()
                    .filter(|s| &s.sbom_id == *id)
                    .collect();
                if scans.is_empty() {
                    return true;
                }
                let Some(cutoff) = cutoff else {
                    return false;
                };
                scans
                    .iter()
                    .all(|s| s.status != ScanStatus::Pending && s.created_at < cutoff)
            })
            .cloned()
            .collect();

        Ok(due)
    }

    async fn create_pending_scan(&self, sbom_id: &str) -> Result<Scan, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.sboms.contains_key(sbom_id) {
            return Err(StoreError::NotFound {
                entity: "sbom".to_owned(),
                id: sbom_id.to_owned(),
            });
        }
        let scan = Scan::new_pending(sbom_id);
        inner.scans.push(scan.clone());
        Ok(scan)
    }

    async fn latest_completed_result_hash(
        &self,
        sbom_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().await;
        let hash = inner
            .scans
            .iter()
            .filter(|s| {
                s.sbom_id == sbom_id
                    && s.status == ScanStatus::Completed
                    && s.result.is_some()
                    && s.result_hash.is_some()
            })
            .max_by_key(|s| s.created_at)
            .and_then(|s| s.result_hash.clone());
        Ok(hash)
    }

    async fn update_scans_by_status(
        &self,
        sbom_id: &str,
        from: ScanStatus,
        to: ScanStatus,
        patch: Option<ScanPatch>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut updated = 0u64;
        for scan in inner
            .scans
            .iter_mut()
            .filter(|s| s.sbom_id == sbom_id && s.status == from)
        {
            scan.status = to;
            if let Some(ref patch) = patch {
                scan.result = Some(patch.result.clone());
                scan.result_hash = Some(patch.result_hash.clone());
            }
            updated += 1;
        }
        Ok(updated)
    }

    async fn stale_pending_scans(
        &self,
        cutoff: SystemTime,
    ) -> Result<Vec<StaleScan>, StoreError> {
        let inner = self.inner.read().await;
        let stale = inner
            .scans
            .iter()
            .filter(|s| s.status == ScanStatus::Pending && s.created_at < cutoff)
            .map(|s| StaleScan {
                id: s.id.clone(),
                sbom_id: s.sbom_id.clone(),
            })
            .collect();
        Ok(stale)
    }

    async fn fail_scans(&self, scan_ids: &[String]) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut updated = 0u64;
        for scan in inner
            .scans
            .iter_mut()
            .filter(|s| s.status == ScanStatus::Pending && scan_ids.contains(&s.id))
        {
            scan.status = ScanStatus::Failed;
            updated += 1;
        }
        Ok(updated)
    }

    async fn webhooks(&self) -> Result<Vec<Webhook>, StoreError> {
        Ok(self.inner.read().await.webhooks.clone())
    }
}
