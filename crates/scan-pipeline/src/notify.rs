//! 웹훅 알림 seam과 URL 조립
//!
//! 결과 파이프라인은 [`WebhookNotifier`]를 통해서만 외부로 알림을
//! 보냅니다. 실제 HTTP 전송 구현은 데몬 쪽에 있으며, 이 모듈은
//! trait과 호출 URL 조립 규칙만 정의합니다.

use std::future::Future;

use sbomwatch_core::types::Webhook;

use crate::error::ScanPipelineError;

/// 웹훅 전달 인터페이스
pub trait WebhookNotifier: Send + Sync {
    /// 조립이 끝난 URL로 알림 한 건을 전달합니다.
    fn notify(&self, url: &str) -> impl Future<Output = Result<(), ScanPipelineError>> + Send;
}

/// 웹훅 호출 URL을 조립합니다.
///
/// `sbom_name_in_query`가 켜진 웹훅에는 SBOM 표시 이름을 `name` 쿼리
/// 파라미터로 덧붙입니다. 기존 쿼리 유무에 따라 `?`/`&`를 선택하고,
/// 이름은 percent-encoding 합니다. 이름이 없으면(또는 옵션이 꺼져
/// 있으면) 등록된 URL을 그대로 반환합니다.
pub fn build_webhook_url(webhook: &Webhook, sbom_name: Option<&str>) -> String {
    let (true, Some(name)) = (webhook.sbom_name_in_query, sbom_name) else {
        return webhook.url.clone();
    };

    let separator = if webhook.url.contains('?') { '&' } else { '?' };
    format!("{}{}name={}", webhook.url, separator, percent_encode(name))
}

/// RFC 3986 unreserved 문자 외 전부를 `%XX`로 인코딩
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
