//! 타임아웃 리퍼 — 오래된 PENDING 스캔의 수거
//!
//! 기준 시간을 넘긴 PENDING 스캔을 찾아 두 부류로 나눕니다:
//!
//! - **큐에 아직 있음**: 큐가 밀려 있는 것이므로 실패 처리하지 않고
//!   경고만 남깁니다. 순서가 오면 정상 처리됩니다.
//! - **큐에 없음**: 어디에도 없는 고아 스캔(크래시, 유실)이므로
//!   FAILED로 전이시킵니다.
//!
//! 큐 멤버십 검사는 [`SingleFlightQueue::search`]로 수행되며, drain
//! 워커가 처리 중인 항목도 큐에 남아 있으므로 "진행 중"이 타임아웃으로
//! 오판되지 않습니다.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use metrics::{counter, gauge};
use tracing::{debug, error, warn};

use sbomwatch_core::error::SbomwatchError;
use sbomwatch_core::metrics::{REAPER_STILL_QUEUED, REAPER_TIMED_OUT_TOTAL};
use sbomwatch_core::store::ScanStore;

use crate::queue::SingleFlightQueue;

/// 스윕 한 번의 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// 기준 시간을 넘겼지만 아직 큐에 있는 스캔 수 (실패 처리 안 함)
    pub still_queued: u64,
    /// FAILED로 전이된 고아 스캔 수
    pub timed_out: u64,
}

/// 타임아웃 리퍼
///
/// 스캔 큐 핸들을 주입받아 스토어의 PENDING 스캔과 대조합니다.
/// 주기 실행은 데몬의 책임이며, 리퍼 자체는 [`sweep`](Self::sweep)
/// 한 번의 로직만 담습니다.
pub struct TimeoutReaper<S> {
    store: Arc<S>,
    scan_queue: Arc<SingleFlightQueue<String>>,
    stale_after: Duration,
}

impl<S> TimeoutReaper<S>
where
    S: ScanStore,
{
    /// 새 리퍼를 생성합니다.
    pub fn new(
        store: Arc<S>,
        scan_queue: Arc<SingleFlightQueue<String>>,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            scan_queue,
            stale_after,
        }
    }

    /// 스윕 한 번을 수행합니다.
    pub async fn sweep(&self) -> Result<SweepOutcome, SbomwatchError> {
        let Some(cutoff) = SystemTime::now().checked_sub(self.stale_after) else {
            // 시계가 기준 시간보다 이른 경우 — 수거할 수 있는 스캔이 없음
            return Ok(SweepOutcome::default());
        };

        let stale = self.store.stale_pending_scans(cutoff).await.map_err(|e| {
            error!(error = %e, "failed to query stale pending scans");
            SbomwatchError::Store(e)
        })?;
        if stale.is_empty() {
            gauge!(REAPER_STILL_QUEUED).set(0.0);
            return Ok(SweepOutcome::default());
        }

        let (queued, stuck): (Vec<_>, Vec<_>) = stale
            .into_iter()
            .partition(|scan| self.scan_queue.search(|id| id == &scan.sbom_id));

        for scan in &queued {
            warn!(
                scan_id = %scan.id,
                sbom_id = %scan.sbom_id,
                "scan exceeded timeout but is still queued, queue is backed up"
            );
        }
        gauge!(REAPER_STILL_QUEUED).set(queued.len() as f64);

        let mut timed_out = 0u64;
        if !stuck.is_empty() {
            let ids: Vec<String> = stuck.iter().map(|scan| scan.id.clone()).collect();
            timed_out = self.store.fail_scans(&ids).await.map_err(|e| {
                error!(error = %e, "failed to mark timed-out scans");
                SbomwatchError::Store(e)
            })?;
            counter!(REAPER_TIMED_OUT_TOTAL).increment(timed_out);
            for scan in &stuck {
                error!(
                    scan_id = %scan.id,
                    sbom_id = %scan.sbom_id,
                    "scan timed out outside the queue, marked FAILED"
                );
            }
        }

        debug!(
            still_queued = queued.len(),
            timed_out, "timeout sweep finished"
        );
        Ok(SweepOutcome {
            still_queued: queued.len() as u64,
            timed_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use sbomwatch_core::store::MemoryStore;
    use sbomwatch_core::types::{SbomRecord, ScanStatus};

    use super::*;

    fn sbom(id: &str) -> SbomRecord {
        SbomRecord {
            id: id.to_owned(),
            name: format!("app-{id}"),
            content: "{}".to_owned(),
            created_at: SystemTime::now(),
        }
    }

    /// stale_after가 0이면 방금 만든 스캔도 즉시 수거 대상이 됨
    fn reaper(
        store: &Arc<MemoryStore>,
        queue: &Arc<SingleFlightQueue<String>>,
    ) -> TimeoutReaper<MemoryStore> {
        TimeoutReaper::new(Arc::clone(store), Arc::clone(queue), Duration::ZERO)
    }

    #[tokio::test]
    async fn empty_store_sweeps_to_nothing() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(SingleFlightQueue::new());

        let outcome = reaper(&store, &queue).sweep().await.unwrap();
        assert_eq!(outcome, SweepOutcome::default());
    }

    #[tokio::test]
    async fn queued_scan_is_not_failed() {
        let store = Arc::new(MemoryStore::new());
        store.insert_sbom(sbom("a")).await;
        store.create_pending_scan("a").await.unwrap();

        let queue = Arc::new(SingleFlightQueue::new());
        queue.enqueue("a".to_owned());

        // 큐가 밀려 있어도 sweep을 반복해서 돌릴 수 있어야 함
        for _ in 0..3 {
            let outcome = reaper(&store, &queue).sweep().await.unwrap();
            assert_eq!(outcome.still_queued, 1);
            assert_eq!(outcome.timed_out, 0);
        }
        assert_eq!(store.scans_for("a").await[0].status, ScanStatus::Pending);
    }

    #[tokio::test]
    async fn orphaned_scan_is_failed() {
        let store = Arc::new(MemoryStore::new());
        store.insert_sbom(sbom("a")).await;
        store.create_pending_scan("a").await.unwrap();

        // 큐에 없음 — 고아 스캔
        let queue = Arc::new(SingleFlightQueue::new());

        let outcome = reaper(&store, &queue).sweep().await.unwrap();
        assert_eq!(outcome.still_queued, 0);
        assert_eq!(outcome.timed_out, 1);
        assert_eq!(store.scans_for("a").await[0].status, ScanStatus::Failed);

        // 두 번째 sweep에서는 이미 FAILED이므로 대상 아님
        let outcome = reaper(&store, &queue).sweep().await.unwrap();
        assert_eq!(outcome.timed_out, 0);
    }

    #[tokio::test]
    async fn mixed_batch_is_partitioned() {
        let store = Arc::new(MemoryStore::new());
        store.insert_sbom(sbom("queued")).await;
        store.insert_sbom(sbom("stuck")).await;
        store.create_pending_scan("queued").await.unwrap();
        store.create_pending_scan("stuck").await.unwrap();

        let queue = Arc::new(SingleFlightQueue::new());
        queue.enqueue("queued".to_owned());

        let outcome = reaper(&store, &queue).sweep().await.unwrap();
        assert_eq!(outcome.still_queued, 1);
        assert_eq!(outcome.timed_out, 1);
        assert_eq!(
            store.scans_for("queued").await[0].status,
            ScanStatus::Pending
        );
        assert_eq!(store.scans_for("stuck").await[0].status, ScanStatus::Failed);
    }

    #[tokio::test]
    async fn fresh_scans_are_left_alone() {
        let store = Arc::new(MemoryStore::new());
        store.insert_sbom(sbom("a")).await;
        store.create_pending_scan("a").await.unwrap();

        let queue = Arc::new(SingleFlightQueue::new());
        let reaper = TimeoutReaper::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            Duration::from_secs(3600),
        );

        let outcome = reaper.sweep().await.unwrap();
        assert_eq!(outcome, SweepOutcome::default());
        assert_eq!(store.scans_for("a").await[0].status, ScanStatus::Pending);
    }
}
