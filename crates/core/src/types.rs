//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 스캔 생명주기(`Scan`, `ScanStatus`)와 스캔 대상(`SbomRecord`),
//! 알림 대상(`Webhook`)을 정의합니다. 파이프라인과 스토어가
//! 이 타입들을 통해 상태를 교환합니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 스캔 상태
///
/// 생명주기: `Pending` → `Completed` 또는 `Failed`.
/// 파이프라인과 타임아웃 리퍼만 상태를 전이시킵니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanStatus {
    /// 큐 대기 중이거나 스캔 진행 중
    #[default]
    Pending,
    /// 결과 평가까지 완료됨
    Completed,
    /// 스캔 실패 (SBOM 누락, 스캐너 오류, 타임아웃)
    Failed,
}

impl ScanStatus {
    /// 문자열에서 상태를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// 스캔 — 특정 SBOM에 대한 취약점 분석 1회 시도
///
/// `result`와 `result_hash`는 결과 파이프라인이 "새로운 내용"으로
/// 판정한 경우에만 채워집니다. 동일한 결과가 반복되면 비워둔 채
/// `Completed`로만 전이합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    /// 스캔 고유 ID (UUID v4)
    pub id: String,
    /// 대상 SBOM ID
    pub sbom_id: String,
    /// 생성 시각
    pub created_at: SystemTime,
    /// 현재 상태
    pub status: ScanStatus,
    /// 스캔 결과 문서 (변경이 있었던 경우에만)
    pub result: Option<serde_json::Value>,
    /// 결과 diff 지문 (변경이 있었던 경우에만)
    pub result_hash: Option<String>,
}

impl Scan {
    /// 새 PENDING 스캔을 생성합니다.
    pub fn new_pending(sbom_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sbom_id: sbom_id.into(),
            created_at: SystemTime::now(),
            status: ScanStatus::Pending,
            result: None,
            result_hash: None,
        }
    }
}

impl fmt::Display for Scan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scan {} (sbom: {}) [{}] hash={}",
            self.id,
            self.sbom_id,
            self.status,
            self.result_hash.as_deref().unwrap_or("-"),
        )
    }
}

/// 상태 전이에 함께 기록할 결과 패치
///
/// `ScanStore::update_scans_by_status`에 전달되어
/// `Pending` → `Completed` 전이와 함께 원자적으로 기록됩니다.
#[derive(Debug, Clone)]
pub struct ScanPatch {
    /// 파싱된 스캔 결과 문서
    pub result: serde_json::Value,
    /// 결과 diff 지문 (SHA-256 hex)
    pub result_hash: String,
}

/// 타임아웃 후보 스캔 (리퍼 조회 결과)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleScan {
    /// 스캔 ID
    pub id: String,
    /// 대상 SBOM ID
    pub sbom_id: String,
}

/// SBOM 레코드 — 스캔 대상 문서
///
/// 이 코어는 SBOM을 읽기 전용으로만 다룹니다. 업로드/검증 표면은
/// 외부 협력자의 책임입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SbomRecord {
    /// SBOM 고유 ID
    pub id: String,
    /// 표시 이름 (웹훅 쿼리 파라미터에 사용)
    pub name: String,
    /// SBOM 문서 원문 (JSON)
    pub content: String,
    /// 등록 시각
    pub created_at: SystemTime,
}

/// 웹훅 — 결과 변경 시 통지할 외부 엔드포인트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    /// 웹훅 고유 ID
    pub id: String,
    /// 통지 대상 URL
    pub url: String,
    /// SBOM 표시 이름을 쿼리 파라미터로 덧붙일지 여부
    pub sbom_name_in_query: bool,
    /// 등록 시각
    pub created_at: SystemTime,
}

impl Webhook {
    /// 새 웹훅을 생성합니다.
    pub fn new(url: impl Into<String>, sbom_name_in_query: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            sbom_name_in_query,
            created_at: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_status_display() {
        assert_eq!(ScanStatus::Pending.to_string(), "PENDING");
        assert_eq!(ScanStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(ScanStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn scan_status_default_is_pending() {
        assert_eq!(ScanStatus::default(), ScanStatus::Pending);
    }

    #[test]
    fn scan_status_from_str_loose() {
        assert_eq!(ScanStatus::from_str_loose("pending"), Some(ScanStatus::Pending));
        assert_eq!(ScanStatus::from_str_loose("COMPLETED"), Some(ScanStatus::Completed));
        assert_eq!(ScanStatus::from_str_loose("Failed"), Some(ScanStatus::Failed));
        assert_eq!(ScanStatus::from_str_loose("unknown"), None);
    }

    #[test]
    fn scan_status_serde_uppercase() {
        let json = serde_json::to_string(&ScanStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
        let back: ScanStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(back, ScanStatus::Failed);
    }

    #[test]
    fn new_pending_scan_has_no_result() {
        let scan = Scan::new_pending("sbom-1");
        assert_eq!(scan.sbom_id, "sbom-1");
        assert_eq!(scan.status, ScanStatus::Pending);
        assert!(scan.result.is_none());
        assert!(scan.result_hash.is_none());
        assert!(!scan.id.is_empty());
    }

    #[test]
    fn scan_display_without_hash() {
        let scan = Scan::new_pending("sbom-1");
        let s = scan.to_string();
        assert!(s.contains("sbom-1"));
        assert!(s.contains("PENDING"));
        assert!(s.contains("hash=-"));
    }

    #[test]
    fn webhook_new_assigns_id() {
        let hook = Webhook::new("http://example.com/hook", true);
        assert!(!hook.id.is_empty());
        assert!(hook.sbom_name_in_query);
    }
}
