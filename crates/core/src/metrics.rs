//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `sbomwatch_`
//! - 모듈명: `scan_`, `result_`, `webhook_`, `reaper_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

// --- 레이블 키 상수 ---

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 실패 사유 레이블 키 (missing_sbom, scanner, malformed_report, timeout)
pub const LABEL_REASON: &str = "reason";

// --- 스캔 파이프라인 메트릭 ---

/// 스캔 큐 깊이 (gauge)
pub const SCAN_QUEUE_DEPTH: &str = "sbomwatch_scan_queue_depth";

/// 외부 스캐너 호출 횟수 (counter, label: result)
pub const SCAN_INVOCATIONS_TOTAL: &str = "sbomwatch_scan_invocations_total";

/// 외부 스캐너 호출 지연 시간 (histogram, 초)
pub const SCAN_DURATION_SECONDS: &str = "sbomwatch_scan_duration_seconds";

/// 실패 처리된 스캔 수 (counter, label: reason)
pub const SCANS_FAILED_TOTAL: &str = "sbomwatch_scans_failed_total";

// --- 결과 파이프라인 메트릭 ---

/// 결과 큐 깊이 (gauge)
pub const RESULT_QUEUE_DEPTH: &str = "sbomwatch_result_queue_depth";

/// 완료 처리된 스캔 수 (counter)
pub const SCANS_COMPLETED_TOTAL: &str = "sbomwatch_scans_completed_total";

/// 지문이 달라져 저장된 결과 수 (counter)
pub const RESULTS_CHANGED_TOTAL: &str = "sbomwatch_results_changed_total";

/// 지문이 같아 저장을 생략한 결과 수 (counter)
pub const RESULTS_UNCHANGED_TOTAL: &str = "sbomwatch_results_unchanged_total";

// --- 웹훅 메트릭 ---

/// 웹훅 전달 시도 수 (counter, label: result)
pub const WEBHOOK_DELIVERIES_TOTAL: &str = "sbomwatch_webhook_deliveries_total";

// --- 스캐너 DB 갱신 메트릭 ---

/// 스캐너 취약점 DB 갱신 시도 수 (counter, label: result)
pub const DB_UPDATES_TOTAL: &str = "sbomwatch_db_updates_total";

// --- 타임아웃 리퍼 메트릭 ---

/// 타임아웃으로 FAILED 처리된 스캔 수 (counter)
pub const REAPER_TIMED_OUT_TOTAL: &str = "sbomwatch_reaper_timed_out_total";

/// 기준 시간을 넘겼지만 아직 큐에 있는 스캔 수 (gauge)
pub const REAPER_STILL_QUEUED: &str = "sbomwatch_reaper_still_queued";

/// 모든 메트릭의 설명을 등록합니다.
///
/// Prometheus recorder 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Scan pipeline
    describe_gauge!(SCAN_QUEUE_DEPTH, "Number of SBOM ids waiting in the scan queue");
    describe_counter!(
        SCAN_INVOCATIONS_TOTAL,
        "Total external scanner invocations (label: result)"
    );
    describe_histogram!(
        SCAN_DURATION_SECONDS,
        "External scanner invocation latency in seconds"
    );
    describe_counter!(
        SCANS_FAILED_TOTAL,
        "Total scans transitioned to FAILED (label: reason)"
    );

    // Result pipeline
    describe_gauge!(
        RESULT_QUEUE_DEPTH,
        "Number of raw scan results waiting in the result queue"
    );
    describe_counter!(
        SCANS_COMPLETED_TOTAL,
        "Total scans transitioned to COMPLETED"
    );
    describe_counter!(
        RESULTS_CHANGED_TOTAL,
        "Total scan results whose diff fingerprint changed"
    );
    describe_counter!(
        RESULTS_UNCHANGED_TOTAL,
        "Total scan results identical to the previous fingerprint"
    );

    // Webhooks
    describe_counter!(
        WEBHOOK_DELIVERIES_TOTAL,
        "Total webhook delivery attempts (label: result)"
    );

    // DB update
    describe_counter!(
        DB_UPDATES_TOTAL,
        "Total scanner vulnerability database update attempts (label: result)"
    );

    // Reaper
    describe_counter!(
        REAPER_TIMED_OUT_TOTAL,
        "Total stale pending scans marked FAILED by the timeout reaper"
    );
    describe_gauge!(
        REAPER_STILL_QUEUED,
        "Stale pending scans still waiting in the scan queue"
    );
}
