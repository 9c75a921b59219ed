//! diff 지문 — 스캔 리포트의 정규화 해시
//!
//! 두 리포트가 "의미적으로 같은지"를 판정하기 위한 지문을 계산합니다.
//! 매치 순서, 다중값 필드의 순서, 대소문자, 앞뒤 공백에 불변이며,
//! 화이트리스트 필드(취약점 ID, 심각도, CVSS 점수 3종, fix 버전/상태,
//! 매치 상세 type, 아티팩트 이름/버전)의 정규화된 값에만 민감합니다.
//!
//! # 알고리즘
//!
//! 1. 매치마다 `"<태그>:<정규화값>"` 토큰을 수집 (소문자화 + trim,
//!    숫자는 기본값 0 포함 문자열화)
//! 2. 다중값 필드는 원소당 토큰 하나
//! 3. 전체 토큰을 사전순 정렬 — 매치 간/필드 내 순서 독립성은
//!    여기서 한 번에 확보됨
//! 4. `;`로 연결한 바이트열의 SHA-256을 hex로 렌더링

use std::fmt::Write;

use sha2::{Digest, Sha256};

use crate::report::ScanReport;

/// 리포트의 diff 지문을 계산합니다.
///
/// 화이트리스트 밖 필드만 다른 두 리포트는 같은 지문을 갖고,
/// 화이트리스트 필드의 정규화값이 하나라도 다르면 지문이 달라집니다.
pub fn compute_fingerprint(report: &ScanReport) -> String {
    let mut tokens: Vec<String> = Vec::new();

    for entry in &report.matches {
        let vuln = &entry.vulnerability;
        tokens.push(text_token("vulnerability-id", &vuln.id));
        tokens.push(text_token("severity", &vuln.severity));

        for cvss in &vuln.cvss {
            tokens.push(score_token("cvss-base", cvss.metrics.base_score));
            tokens.push(score_token(
                "cvss-exploitability",
                cvss.metrics.exploitability_score,
            ));
            tokens.push(score_token("cvss-impact", cvss.metrics.impact_score));
        }

        for version in &vuln.fix.versions {
            tokens.push(text_token("fix-version", version));
        }
        tokens.push(text_token("fix-state", &vuln.fix.state));

        for detail in &entry.match_details {
            tokens.push(text_token("match-detail-type", &detail.detail_type));
        }

        tokens.push(text_token("artifact-name", &entry.artifact.name));
        tokens.push(text_token("artifact-version", &entry.artifact.version));
    }

    tokens.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(tokens.join(";").as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

fn text_token(tag: &str, value: &str) -> String {
    format!("{tag}:{}", value.trim().to_lowercase())
}

fn score_token(tag: &str, value: f64) -> String {
    format!("{tag}:{value}")
}
