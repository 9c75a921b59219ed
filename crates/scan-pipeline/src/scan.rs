//! 스캔 파이프라인 — SBOM 큐 소진과 외부 스캐너 호출
//!
//! [`ScanPipeline`]은 core의 [`Pipeline`](sbomwatch_core::pipeline::Pipeline)
//! trait을 구현하여 `sbomwatch-daemon`에서 결과 파이프라인과 동일한
//! 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! submit(sbom_id) -> scan queue -> drain worker -> scanner -> result queue
//! ```
//!
//! drain 워커는 큐당 하나이며, `peek` → 처리 → `pop` 순서로 항목을
//! 소진합니다. 처리 중인 항목은 구조적으로 큐에 남아 있어 타임아웃
//! 리퍼의 큐 멤버십 검사에 "진행 중"으로 관찰됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sbomwatch_core::error::SbomwatchError;
use sbomwatch_core::metrics::{
    LABEL_REASON, LABEL_RESULT, RESULT_QUEUE_DEPTH, SCAN_DURATION_SECONDS,
    SCAN_INVOCATIONS_TOTAL, SCAN_QUEUE_DEPTH, SCANS_FAILED_TOTAL,
};
use sbomwatch_core::pipeline::{HealthStatus, Pipeline};
use sbomwatch_core::store::ScanStore;
use sbomwatch_core::types::ScanStatus;

use crate::queue::SingleFlightQueue;
use crate::result::RawScanResult;
use crate::scanner::ScannerAdapter;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 스캔 파이프라인 — SBOM ID를 받아 외부 스캐너를 직렬로 호출합니다.
///
/// # 사용 예시
/// ```ignore
/// use sbomwatch_scan_pipeline::{ScanPipeline, ScanPipelineBuilder};
///
/// let mut pipeline = ScanPipelineBuilder::new(store, scanner)
///     .result_queue(result_queue)  // 결과 파이프라인과 공유
///     .build();
///
/// pipeline.start().await?;
/// pipeline.submit("sbom-1");
/// ```
#[derive(Debug)]
pub struct ScanPipeline<S, A> {
    /// 현재 상태
    state: PipelineState,
    /// 영속성 스토어
    store: Arc<S>,
    /// 외부 스캐너 어댑터
    scanner: Arc<A>,
    /// 스캔 대기 큐 (SBOM ID)
    scan_queue: Arc<SingleFlightQueue<String>>,
    /// 결과 인계 큐 (결과 파이프라인과 공유)
    result_queue: Arc<SingleFlightQueue<RawScanResult>>,
    /// 워커 취소 토큰
    cancel: CancellationToken,
    /// drain 워커 핸들
    worker: Option<JoinHandle<()>>,
    /// 스캐너 호출 성공 카운터
    processed_count: Arc<AtomicU64>,
    /// 실패 처리된 스캔 카운터
    failed_count: Arc<AtomicU64>,
}

impl<S, A> ScanPipeline<S, A>
where
    S: ScanStore + 'static,
    A: ScannerAdapter + 'static,
{
    /// SBOM을 스캔 큐에 추가합니다.
    ///
    /// 큐가 비어 있었다면 drain 워커가 깨어나고, 아니면 실행 중인
    /// 루프가 순서대로 가져갑니다. PENDING 스캔 행 생성은 호출자
    /// (스케줄러)의 책임입니다.
    pub fn submit(&self, sbom_id: impl Into<String>) {
        let sbom_id = sbom_id.into();
        debug!(sbom_id, "sbom queued for scanning");
        self.scan_queue.enqueue(sbom_id);
        gauge!(SCAN_QUEUE_DEPTH).set(self.scan_queue.len() as f64);
    }

    /// 스캔 큐에 대한 공유 핸들을 반환합니다 (리퍼의 멤버십 검사용).
    pub fn scan_queue(&self) -> Arc<SingleFlightQueue<String>> {
        Arc::clone(&self.scan_queue)
    }

    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 스캐너 호출에 성공한 스캔 수를 반환합니다.
    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    /// 실패 처리된 스캔 수를 반환합니다.
    pub fn failed_count(&self) -> u64 {
        self.failed_count.load(Ordering::Relaxed)
    }
}

/// drain 워커 본체 — 취소될 때까지 큐를 소진합니다.
async fn drain_worker<S, A>(
    store: Arc<S>,
    scanner: Arc<A>,
    scan_queue: Arc<SingleFlightQueue<String>>,
    result_queue: Arc<SingleFlightQueue<RawScanResult>>,
    cancel: CancellationToken,
    processed_count: Arc<AtomicU64>,
    failed_count: Arc<AtomicU64>,
) where
    S: ScanStore,
    A: ScannerAdapter,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = scan_queue.wait_nonempty() => {}
        }

        // peek -> 처리 -> pop: 처리 중 항목은 큐에 남아 있어야 함
        while let Some(sbom_id) = scan_queue.peek() {
            if cancel.is_cancelled() {
                return;
            }
            process_one(
                &*store,
                &*scanner,
                &result_queue,
                &sbom_id,
                &processed_count,
                &failed_count,
            )
            .await;
            scan_queue.pop();
            gauge!(SCAN_QUEUE_DEPTH).set(scan_queue.len() as f64);
        }
    }
}

/// 큐 항목 하나를 처리합니다.
///
/// SBOM 본문 조회 → 스캐너 호출 → 결과 큐 인계. 실패 경로:
/// - SBOM 누락 또는 스캐너 실패: PENDING 스캔을 즉시 FAILED로 전이
/// - 스토어 에러: 로그만 남기고 중단 (스캔은 PENDING으로 남아
///   타임아웃 리퍼가 수거)
async fn process_one<S, A>(
    store: &S,
    scanner: &A,
    result_queue: &SingleFlightQueue<RawScanResult>,
    sbom_id: &str,
    processed_count: &AtomicU64,
    failed_count: &AtomicU64,
) where
    S: ScanStore,
    A: ScannerAdapter,
{
    let content = match store.sbom_content(sbom_id).await {
        Ok(Some(content)) => content,
        Ok(None) => {
            warn!(sbom_id, "sbom not found, failing pending scan");
            fail_pending(store, sbom_id, "missing_sbom", failed_count).await;
            return;
        }
        Err(err) => {
            error!(sbom_id, error = %err, "failed to load sbom content");
            return;
        }
    };

    let started = Instant::now();
    let outcome = scanner.scan(sbom_id, &content).await;
    histogram!(SCAN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

    match outcome {
        Ok(raw) => {
            counter!(SCAN_INVOCATIONS_TOTAL, LABEL_RESULT => "success").increment(1);
            processed_count.fetch_add(1, Ordering::Relaxed);
            debug!(sbom_id, bytes = raw.len(), "scanner finished, handing off result");
            result_queue.enqueue(RawScanResult {
                sbom_id: sbom_id.to_owned(),
                raw,
            });
            gauge!(RESULT_QUEUE_DEPTH).set(result_queue.len() as f64);
        }
        Err(err) => {
            counter!(SCAN_INVOCATIONS_TOTAL, LABEL_RESULT => "failure").increment(1);
            warn!(sbom_id, error = %err, "scanner invocation failed, failing pending scan");
            fail_pending(store, sbom_id, "scanner", failed_count).await;
        }
    }
}

/// 해당 SBOM의 PENDING 스캔을 FAILED로 전이시킵니다.
async fn fail_pending<S>(store: &S, sbom_id: &str, reason: &'static str, failed_count: &AtomicU64)
where
    S: ScanStore,
{
    match store
        .update_scans_by_status(sbom_id, ScanStatus::Pending, ScanStatus::Failed, None)
        .await
    {
        Ok(updated) => {
            counter!(SCANS_FAILED_TOTAL, LABEL_REASON => reason).increment(updated);
            failed_count.fetch_add(updated, Ordering::Relaxed);
            if updated == 0 {
                // 리퍼가 먼저 처리했거나 스캔 행이 만들어지지 않은 경우
                warn!(sbom_id, "no pending scan to fail");
            }
        }
        Err(err) => {
            error!(sbom_id, error = %err, "failed to mark scan as failed");
        }
    }
}

impl<S, A> Pipeline for ScanPipeline<S, A>
where
    S: ScanStore + 'static,
    A: ScannerAdapter + 'static,
{
    async fn start(&mut self) -> Result<(), SbomwatchError> {
        if self.state == PipelineState::Running {
            return Err(sbomwatch_core::error::PipelineError::AlreadyRunning.into());
        }

        info!("starting scan pipeline");

        let handle = tokio::spawn(drain_worker(
            Arc::clone(&self.store),
            Arc::clone(&self.scanner),
            Arc::clone(&self.scan_queue),
            Arc::clone(&self.result_queue),
            self.cancel.clone(),
            Arc::clone(&self.processed_count),
            Arc::clone(&self.failed_count),
        ));
        self.worker = Some(handle);

        self.state = PipelineState::Running;
        info!("scan pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SbomwatchError> {
        if self.state != PipelineState::Running {
            return Err(sbomwatch_core::error::PipelineError::NotRunning.into());
        }

        info!(
            remaining = self.scan_queue.len(),
            "stopping scan pipeline"
        );

        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }

        self.state = PipelineState::Stopped;
        info!("scan pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.worker.as_ref().is_some_and(JoinHandle::is_finished) {
                    HealthStatus::Unhealthy("drain worker exited".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 스캔 파이프라인 빌더
///
/// 큐를 명시적으로 주입할 수 있습니다. 지정하지 않으면 새 큐를
/// 생성합니다. 결과 큐는 결과 파이프라인과 공유해야 하므로
/// 데몬에서는 항상 주입합니다.
pub struct ScanPipelineBuilder<S, A> {
    store: Arc<S>,
    scanner: Arc<A>,
    scan_queue: Option<Arc<SingleFlightQueue<String>>>,
    result_queue: Option<Arc<SingleFlightQueue<RawScanResult>>>,
    cancel: Option<CancellationToken>,
}

impl<S, A> ScanPipelineBuilder<S, A>
where
    S: ScanStore + 'static,
    A: ScannerAdapter + 'static,
{
    /// 새 빌더를 생성합니다.
    pub fn new(store: Arc<S>, scanner: Arc<A>) -> Self {
        Self {
            store,
            scanner,
            scan_queue: None,
            result_queue: None,
            cancel: None,
        }
    }

    /// 스캔 큐를 주입합니다 (리퍼와 공유).
    pub fn scan_queue(mut self, queue: Arc<SingleFlightQueue<String>>) -> Self {
        self.scan_queue = Some(queue);
        self
    }

    /// 결과 큐를 주입합니다 (결과 파이프라인과 공유).
    pub fn result_queue(mut self, queue: Arc<SingleFlightQueue<RawScanResult>>) -> Self {
        self.result_queue = Some(queue);
        self
    }

    /// 취소 토큰을 주입합니다 (데몬 전역 shutdown에 연결).
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> ScanPipeline<S, A> {
        ScanPipeline {
            state: PipelineState::Initialized,
            store: self.store,
            scanner: self.scanner,
            scan_queue: self.scan_queue.unwrap_or_default(),
            result_queue: self.result_queue.unwrap_or_default(),
            cancel: self.cancel.unwrap_or_default(),
            worker: None,
            processed_count: Arc::new(AtomicU64::new(0)),
            failed_count: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sbomwatch_core::store::MemoryStore;
    use sbomwatch_core::types::SbomRecord;

    use super::*;
    use crate::error::ScanPipelineError;

    /// 스크립트된 스캐너 — 항상 고정 응답을 반환
    struct FakeScanner {
        fail: bool,
    }

    impl ScannerAdapter for FakeScanner {
        async fn scan(&self, _sbom_id: &str, _content: &str) -> Result<String, ScanPipelineError> {
            if self.fail {
                Err(ScanPipelineError::Scanner {
                    reason: "scripted failure".to_owned(),
                })
            } else {
                Ok(r#"{"matches": []}"#.to_owned())
            }
        }
    }

    fn sbom(id: &str) -> SbomRecord {
        SbomRecord {
            id: id.to_owned(),
            name: format!("app-{id}"),
            content: "{}".to_owned(),
            created_at: std::time::SystemTime::now(),
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn successful_scan_hands_off_to_result_queue() {
        let store = Arc::new(MemoryStore::new());
        store.insert_sbom(sbom("a")).await;
        store.create_pending_scan("a").await.unwrap();

        let result_queue = Arc::new(SingleFlightQueue::new());
        let mut pipeline = ScanPipelineBuilder::new(store, Arc::new(FakeScanner { fail: false }))
            .result_queue(Arc::clone(&result_queue))
            .build();

        pipeline.start().await.unwrap();
        pipeline.submit("a");

        let queue = Arc::clone(&result_queue);
        wait_until(move || !queue.is_empty()).await;

        let handed = result_queue.pop().unwrap();
        assert_eq!(handed.sbom_id, "a");
        assert!(handed.raw.contains("matches"));
        assert_eq!(pipeline.processed_count(), 1);

        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn missing_sbom_fails_pending_scan() {
        let store = Arc::new(MemoryStore::new());
        store.insert_sbom(sbom("a")).await;
        store.create_pending_scan("a").await.unwrap();
        // SBOM은 있지만 큐에는 존재하지 않는 ID를 넣는 경우도 동일 경로
        let mut pipeline = ScanPipelineBuilder::new(
            Arc::clone(&store),
            Arc::new(FakeScanner { fail: false }),
        )
        .build();

        pipeline.start().await.unwrap();
        pipeline.submit("missing");

        let scan_queue = pipeline.scan_queue();
        wait_until(move || scan_queue.is_empty()).await;

        // 대상 SBOM이 없으므로 아무 스캔도 전이되지 않음
        assert_eq!(store.scans_for("a").await[0].status, ScanStatus::Pending);
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn scanner_failure_marks_scan_failed() {
        let store = Arc::new(MemoryStore::new());
        store.insert_sbom(sbom("a")).await;
        store.create_pending_scan("a").await.unwrap();

        let mut pipeline = ScanPipelineBuilder::new(
            Arc::clone(&store),
            Arc::new(FakeScanner { fail: true }),
        )
        .build();

        pipeline.start().await.unwrap();
        pipeline.submit("a");

        tokio::time::timeout(Duration::from_secs(2), async {
            while store.scans_for("a").await[0].status != ScanStatus::Failed {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("scan should be marked FAILED");

        assert_eq!(pipeline.failed_count(), 1);
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut pipeline =
            ScanPipelineBuilder::new(store, Arc::new(FakeScanner { fail: false })).build();

        assert_eq!(pipeline.state_name(), "initialized");
        pipeline.start().await.unwrap();
        assert!(pipeline.start().await.is_err());
        pipeline.stop().await.unwrap();
        assert!(pipeline.stop().await.is_err());
        assert_eq!(pipeline.state_name(), "stopped");
    }

    #[tokio::test]
    async fn health_reflects_lifecycle() {
        let store = Arc::new(MemoryStore::new());
        let mut pipeline =
            ScanPipelineBuilder::new(store, Arc::new(FakeScanner { fail: false })).build();

        assert!(pipeline.health_check().await.is_unhealthy());
        pipeline.start().await.unwrap();
        assert!(pipeline.health_check().await.is_healthy());
        pipeline.stop().await.unwrap();
        assert!(pipeline.health_check().await.is_unhealthy());
    }

    #[tokio::test]
    async fn items_are_processed_in_submission_order() {
        let store = Arc::new(MemoryStore::new());
        for id in ["a", "b", "c"] {
            store.insert_sbom(sbom(id)).await;
        }

        let result_queue = Arc::new(SingleFlightQueue::new());
        let mut pipeline = ScanPipelineBuilder::new(store, Arc::new(FakeScanner { fail: false }))
            .result_queue(Arc::clone(&result_queue))
            .build();

        pipeline.start().await.unwrap();
        for id in ["a", "b", "c"] {
            pipeline.submit(id);
        }

        let queue = Arc::clone(&result_queue);
        wait_until(move || queue.len() == 3).await;

        let order: Vec<String> = std::iter::from_fn(|| result_queue.pop())
            .map(|r| r.sbom_id)
            .collect();
        assert_eq!(order, ["a", "b", "c"]);

        pipeline.stop().await.unwrap();
    }
}
