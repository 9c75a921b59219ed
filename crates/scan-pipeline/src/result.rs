//! 결과 파이프라인 — 스캔 결과의 파싱, diff 판정, 웹훅 fan-out
//!
//! 스캔 파이프라인이 인계한 원시 리포트를 직렬로 평가합니다:
//!
//! 1. 원시 텍스트를 리포트 JSON으로 파싱 (JSON이 아니거나 리포트
//!    형태가 아니면 스캔 FAILED)
//! 2. diff 지문 계산 후 직전 저장 지문과 비교
//! 3. 새 내용이면 결과와 지문을 기록하며 COMPLETED로 전이,
//!    동일하면 결과 없이 COMPLETED로만 전이
//! 4. 새 내용일 때만 등록된 웹훅 전체에 알림 fan-out
//!
//! 평가는 결과 큐 하나당 워커 하나로 직렬화되지만, 웹훅 전달은
//! 평가 루프를 막지 않도록 태스크로 분리됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sbomwatch_core::error::SbomwatchError;
use sbomwatch_core::metrics::{
    LABEL_REASON, LABEL_RESULT, RESULT_QUEUE_DEPTH, RESULTS_CHANGED_TOTAL,
    RESULTS_UNCHANGED_TOTAL, SCANS_COMPLETED_TOTAL, SCANS_FAILED_TOTAL, WEBHOOK_DELIVERIES_TOTAL,
};
use sbomwatch_core::pipeline::{HealthStatus, Pipeline};
use sbomwatch_core::store::ScanStore;
use sbomwatch_core::types::{ScanPatch, ScanStatus};

use crate::fingerprint::compute_fingerprint;
use crate::notify::{WebhookNotifier, build_webhook_url};
use crate::queue::SingleFlightQueue;
use crate::report::ScanReport;

/// 스캔 파이프라인이 인계하는 원시 스캔 결과
#[derive(Debug, Clone)]
pub struct RawScanResult {
    /// 대상 SBOM ID
    pub sbom_id: String,
    /// 스캐너 stdout 원문
    pub raw: String,
}

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

/// 결과 파이프라인 — 원시 스캔 결과를 평가하고 변경 시에만 알립니다.
#[derive(Debug)]
pub struct ResultPipeline<S, N> {
    /// 현재 상태
    state: PipelineState,
    /// 영속성 스토어
    store: Arc<S>,
    /// 웹훅 전달 구현
    notifier: Arc<N>,
    /// 결과 대기 큐 (스캔 파이프라인과 공유)
    result_queue: Arc<SingleFlightQueue<RawScanResult>>,
    /// 워커 취소 토큰
    cancel: CancellationToken,
    /// drain 워커 핸들
    worker: Option<JoinHandle<()>>,
    /// 평가 완료 카운터
    evaluated_count: Arc<AtomicU64>,
    /// 지문 변경 카운터
    changed_count: Arc<AtomicU64>,
}

impl<S, N> ResultPipeline<S, N>
where
    S: ScanStore + 'static,
    N: WebhookNotifier + 'static,
{
    /// 결과 큐에 대한 공유 핸들을 반환합니다.
    pub fn result_queue(&self) -> Arc<SingleFlightQueue<RawScanResult>> {
        Arc::clone(&self.result_queue)
    }

    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 평가가 끝난 결과 수를 반환합니다.
    pub fn evaluated_count(&self) -> u64 {
        self.evaluated_count.load(Ordering::Relaxed)
    }

    /// 지문이 달라져 저장된 결과 수를 반환합니다.
    pub fn changed_count(&self) -> u64 {
        self.changed_count.load(Ordering::Relaxed)
    }
}

/// drain 워커 본체 — 취소될 때까지 결과 큐를 소진합니다.
async fn drain_worker<S, N>(
    store: Arc<S>,
    notifier: Arc<N>,
    result_queue: Arc<SingleFlightQueue<RawScanResult>>,
    cancel: CancellationToken,
    evaluated_count: Arc<AtomicU64>,
    changed_count: Arc<AtomicU64>,
) where
    S: ScanStore,
    N: WebhookNotifier + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = result_queue.wait_nonempty() => {}
        }

        while let Some(item) = result_queue.peek() {
            if cancel.is_cancelled() {
                return;
            }
            evaluate_one(&*store, &notifier, &item, &evaluated_count, &changed_count).await;
            result_queue.pop();
            gauge!(RESULT_QUEUE_DEPTH).set(result_queue.len() as f64);
        }
    }
}

/// 결과 하나를 평가합니다.
async fn evaluate_one<S, N>(
    store: &S,
    notifier: &Arc<N>,
    item: &RawScanResult,
    evaluated_count: &AtomicU64,
    changed_count: &AtomicU64,
) where
    S: ScanStore,
    N: WebhookNotifier + 'static,
{
    let sbom_id = item.sbom_id.as_str();

    // 1. 파싱 — 유효한 JSON이면서 리포트 형태여야 함. 둘 중 하나라도
    //    아니면 스캔 실패로 종결 (필드 누락은 default로 흡수되지만,
    //    타입이 틀린 필드는 리포트가 아님)
    let value: serde_json::Value = match serde_json::from_str(&item.raw) {
        Ok(value) => value,
        Err(err) => {
            fail_malformed(store, sbom_id, &err.to_string()).await;
            return;
        }
    };
    let report: ScanReport = match serde_json::from_value(value.clone()) {
        Ok(report) => report,
        Err(err) => {
            fail_malformed(store, sbom_id, &err.to_string()).await;
            return;
        }
    };

    // 2. 지문 비교 — 직전 저장 지문이 없으면 첫 결과(baseline)
    let fingerprint = compute_fingerprint(&report);
    let prior = match store.latest_completed_result_hash(sbom_id).await {
        Ok(prior) => prior,
        Err(err) => {
            error!(sbom_id, error = %err, "failed to load prior result hash");
            return;
        }
    };
    let is_new = prior.as_deref() != Some(fingerprint.as_str());

    // 3. COMPLETED 전이 — 새 내용일 때만 결과와 지문을 함께 기록
    let patch = is_new.then(|| ScanPatch {
        result: value,
        result_hash: fingerprint.clone(),
    });
    match store
        .update_scans_by_status(sbom_id, ScanStatus::Pending, ScanStatus::Completed, patch)
        .await
    {
        Ok(0) => {
            // 리퍼가 타임아웃 처리한 뒤 결과가 늦게 도착한 경우 —
            // 저장되지 않은 결과이므로 통지도 하지 않음
            warn!(sbom_id, "no pending scan to complete, dropping result");
            return;
        }
        Ok(updated) => {
            counter!(SCANS_COMPLETED_TOTAL).increment(updated);
        }
        Err(err) => {
            error!(sbom_id, error = %err, "failed to mark scan as completed");
            return;
        }
    }

    evaluated_count.fetch_add(1, Ordering::Relaxed);
    if is_new {
        counter!(RESULTS_CHANGED_TOTAL).increment(1);
        changed_count.fetch_add(1, Ordering::Relaxed);
        info!(sbom_id, hash = %fingerprint, "scan result changed");
        fan_out(store, notifier, sbom_id).await;
    } else {
        counter!(RESULTS_UNCHANGED_TOTAL).increment(1);
        debug!(sbom_id, "scan result unchanged, skipping notifications");
    }
}

/// 리포트로 해석할 수 없는 출력 — 해당 SBOM의 PENDING 스캔을 FAILED로
/// 종결합니다. 원문은 저장하지 않습니다.
async fn fail_malformed<S>(store: &S, sbom_id: &str, reason: &str)
where
    S: ScanStore,
{
    warn!(sbom_id, reason, "malformed scanner output, failing pending scan");
    match store
        .update_scans_by_status(sbom_id, ScanStatus::Pending, ScanStatus::Failed, None)
        .await
    {
        Ok(updated) => {
            counter!(SCANS_FAILED_TOTAL, LABEL_REASON => "malformed_report").increment(updated);
        }
        Err(err) => {
            error!(sbom_id, error = %err, "failed to mark scan as failed");
        }
    }
}

/// 등록된 웹훅 전체에 알림을 보냅니다.
///
/// 전달은 태스크로 분리되어 평가 루프를 막지 않으며, 개별 실패는
/// 경고 로그와 카운터로만 기록합니다 (다른 웹훅 전달에 영향 없음).
async fn fan_out<S, N>(store: &S, notifier: &Arc<N>, sbom_id: &str)
where
    S: ScanStore,
    N: WebhookNotifier + 'static,
{
    let webhooks = match store.webhooks().await {
        Ok(webhooks) => webhooks,
        Err(err) => {
            error!(sbom_id, error = %err, "failed to load webhooks");
            return;
        }
    };
    if webhooks.is_empty() {
        return;
    }

    let sbom_name = match store.sbom_display_name(sbom_id).await {
        Ok(name) => name,
        Err(err) => {
            warn!(sbom_id, error = %err, "failed to load sbom name, notifying without it");
            None
        }
    };

    debug!(sbom_id, count = webhooks.len(), "fanning out webhook notifications");
    for webhook in webhooks {
        let url = build_webhook_url(&webhook, sbom_name.as_deref());
        let notifier = Arc::clone(notifier);
        let webhook_id = webhook.id;
        tokio::spawn(async move {
            match notifier.notify(&url).await {
                Ok(()) => {
                    counter!(WEBHOOK_DELIVERIES_TOTAL, LABEL_RESULT => "success").increment(1);
                    debug!(webhook_id, "webhook delivered");
                }
                Err(err) => {
                    counter!(WEBHOOK_DELIVERIES_TOTAL, LABEL_RESULT => "failure").increment(1);
                    warn!(webhook_id, error = %err, "webhook delivery failed");
                }
            }
        });
    }
}

impl<S, N> Pipeline for ResultPipeline<S, N>
where
    S: ScanStore + 'static,
    N: WebhookNotifier + 'static,
{
    async fn start(&mut self) -> Result<(), SbomwatchError> {
        if self.state == PipelineState::Running {
            return Err(sbomwatch_core::error::PipelineError::AlreadyRunning.into());
        }

        info!("starting result pipeline");

        let handle = tokio::spawn(drain_worker(
            Arc::clone(&self.store),
            Arc::clone(&self.notifier),
            Arc::clone(&self.result_queue),
            self.cancel.clone(),
            Arc::clone(&self.evaluated_count),
            Arc::clone(&self.changed_count),
        ));
        self.worker = Some(handle);

        self.state = PipelineState::Running;
        info!("result pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SbomwatchError> {
        if self.state != PipelineState::Running {
            return Err(sbomwatch_core::error::PipelineError::NotRunning.into());
        }

        info!(
            remaining = self.result_queue.len(),
            "stopping result pipeline"
        );

        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }

        self.state = PipelineState::Stopped;
        info!("result pipeline stopped");
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

/// 결과 파이프라인 빌더
pub struct ResultPipelineBuilder<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    result_queue: Option<Arc<SingleFlightQueue<RawScanResult>>>,
    cancel: Option<CancellationToken>,
}

impl<S, N> ResultPipelineBuilder<S, N>
where
    S: ScanStore + 'static,
    N: WebhookNotifier + 'static,
{
    /// 새 빌더를 생성합니다.
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self {
            store,
            notifier,
            result_queue: None,
            cancel: None,
        }
    }

    /// 결과 큐를 주입합니다 (스캔 파이프라인과 공유).
    pub fn result_queue(mut self, queue: Arc<SingleFlightQueue<RawScanResult>>) -> Self {
        self.result_queue = Some(queue);
        self
    }

    /// 취소 토큰을 주입합니다.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> ResultPipeline<S, N> {
        ResultPipeline {
            state: PipelineState::Initialized,
            store: self.store,
            notifier: self.notifier,
            result_queue: self.result_queue.unwrap_or_default(),
            cancel: self.cancel.unwrap_or_default(),
            worker: None,
            evaluated_count: Arc::new(AtomicU64::new(0)),
            changed_count: Arc::new(AtomicU64::new(0)),
        }
    }
}
