//! 스캔 리포트 모델 — 외부 스캐너 JSON 출력의 타입
//!
//! 스캐너 출력은 필드가 수시로 빠지는 느슨한 JSON이므로, 지문 계산에
//! 쓰이는 필드만 명시적으로 모델링하고 전부 `#[serde(default)]`로
//! 선언합니다. 빠진 문자열은 빈 문자열, 빠진 점수는 `0`으로
//! 정규화되어 지문 토큰에 그대로 반영됩니다 (없음과 0이 동일하게
//! 취급되는 것은 의도된 동작입니다). 모델 밖의 필드는 무시되며
//! 지문에 영향을 주지 않습니다.

use serde::{Deserialize, Serialize};

/// 스캔 리포트 전체 — 매치 목록
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    /// 취약점-아티팩트 매치 목록
    #[serde(default)]
    pub matches: Vec<VulnerabilityMatch>,
}

/// 취약점 하나와 아티팩트 하나의 매치
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityMatch {
    /// 취약점 정보
    #[serde(default)]
    pub vulnerability: VulnerabilityRecord,
    /// 매치 상세 목록
    #[serde(default)]
    pub match_details: Vec<MatchDetail>,
    /// 영향받는 아티팩트
    #[serde(default)]
    pub artifact: ArtifactRecord,
}

/// 취약점 레코드
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    /// 취약점 식별자 (예: CVE-2023-42366)
    #[serde(default)]
    pub id: String,
    /// 심각도 문자열
    #[serde(default)]
    pub severity: String,
    /// CVSS 점수 목록
    #[serde(default)]
    pub cvss: Vec<CvssEntry>,
    /// 수정 정보
    #[serde(default)]
    pub fix: FixRecord,
}

/// CVSS 점수 엔트리
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CvssEntry {
    /// 점수 3종 (base/exploitability/impact)
    #[serde(default)]
    pub metrics: CvssMetrics,
}

/// CVSS 점수 3종
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvssMetrics {
    /// 기본 점수
    #[serde(default)]
    pub base_score: f64,
    /// 공격 용이성 점수
    #[serde(default)]
    pub exploitability_score: f64,
    /// 영향도 점수
    #[serde(default)]
    pub impact_score: f64,
}

/// 수정(fix) 정보
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixRecord {
    /// 수정된 버전 목록
    #[serde(default)]
    pub versions: Vec<String>,
    /// 수정 상태 (fixed, not-fixed, unknown 등)
    #[serde(default)]
    pub state: String,
}

/// 매치 상세
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchDetail {
    /// 매치 방식 (exact-direct-match, cpe-match 등)
    #[serde(default, rename = "type")]
    pub detail_type: String,
}

/// 아티팩트 레코드
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// 패키지명
    #[serde(default)]
    pub name: String,
    /// 패키지 버전
    #[serde(default)]
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_parses_to_empty_report() {
        let report: ScanReport = serde_json::from_str("{}").unwrap();
        assert!(report.matches.is_empty());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let json = r#"{"matches": [{"vulnerability": {"id": "CVE-2024-1"}}]}"#;
        let report: ScanReport = serde_json::from_str(json).unwrap();
        let m = &report.matches[0];
        assert_eq!(m.vulnerability.id, "CVE-2024-1");
        assert_eq!(m.vulnerability.severity, "");
        assert!(m.vulnerability.cvss.is_empty());
        assert_eq!(m.vulnerability.fix.state, "");
        assert!(m.match_details.is_empty());
        assert_eq!(m.artifact.name, "");
    }

    #[test]
    fn missing_scores_default_to_zero() {
        let json = r#"{
            "matches": [{
                "vulnerability": {"id": "x", "cvss": [{"metrics": {"baseScore": 5.5}}]}
            }]
        }"#;
        let report: ScanReport = serde_json::from_str(json).unwrap();
        let metrics = report.matches[0].vulnerability.cvss[0].metrics;
        assert_eq!(metrics.base_score, 5.5);
        assert_eq!(metrics.exploitability_score, 0.0);
        assert_eq!(metrics.impact_score, 0.0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{
            "matches": [{
                "vulnerability": {
                    "id": "CVE-2024-1",
                    "dataSource": "https://nvd.nist.gov",
                    "urls": ["https://example.com"]
                },
                "artifact": {"name": "busybox", "version": "1.36.1", "purl": "pkg:apk/busybox"}
            }],
            "descriptor": {"version": "0.74.0"}
        }"#;
        let report: ScanReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.matches[0].artifact.name, "busybox");
    }

    #[test]
    fn match_detail_type_renamed() {
        let json = r#"{"matches": [{"matchDetails": [{"type": "cpe-match"}]}]}"#;
        let report: ScanReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.matches[0].match_details[0].detail_type, "cpe-match");
    }
}
