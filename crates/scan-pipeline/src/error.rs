//! 스캔 파이프라인 에러 타입
//!
//! [`ScanPipelineError`]는 파이프라인 모듈 내에서 발생할 수 있는 모든
//! 에러를 나타냅니다. `From<ScanPipelineError> for SbomwatchError` 구현을
//! 통해 `?` 연산자로 상위 에러 타입으로 자연스럽게 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **스캐너 호출**: `Scanner`, `ScannerExit`
//! - **결과 파싱**: `MalformedReport`
//! - **영속성**: `Store`
//! - **웹훅 전달**: `Notify`
//! - **파일 I/O**: `Io`

use sbomwatch_core::error::{SbomwatchError, ScanError, StoreError};

/// 스캔 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanPipelineError {
    /// 외부 스캐너 실행 실패 (spawn 불가 등)
    #[error("scanner invocation failed: {reason}")]
    Scanner {
        /// 실패 사유
        reason: String,
    },

    /// 외부 스캐너 비정상 종료
    #[error("scanner exited with {status}: {stderr}")]
    ScannerExit {
        /// 종료 상태 표시 문자열
        status: String,
        /// stderr 요약
        stderr: String,
    },

    /// 스캔 결과를 리포트로 파싱할 수 없음
    #[error("malformed scan report: {reason}")]
    MalformedReport {
        /// 파싱 실패 사유
        reason: String,
    },

    /// 스토어 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 웹훅 전달 실패
    #[error("webhook delivery failed: {url}: {reason}")]
    Notify {
        /// 대상 URL
        url: String,
        /// 실패 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },
}

impl From<ScanPipelineError> for SbomwatchError {
    fn from(err: ScanPipelineError) -> Self {
        match err {
            ScanPipelineError::Scanner { reason } => {
                SbomwatchError::Scan(ScanError::ScannerFailed(reason))
            }
            ScanPipelineError::ScannerExit { status, stderr } => SbomwatchError::Scan(
                ScanError::ScannerFailed(format!("scanner exited with {status}: {stderr}")),
            ),
            ScanPipelineError::MalformedReport { reason } => {
                SbomwatchError::Scan(ScanError::MalformedReport(reason))
            }
            ScanPipelineError::Store(err) => SbomwatchError::Store(err),
            ScanPipelineError::Notify { url, reason } => {
                SbomwatchError::Scan(ScanError::Notify(format!("{url}: {reason}")))
            }
            ScanPipelineError::Io { path, source } => SbomwatchError::Scan(
                ScanError::ScannerFailed(format!("io error: {path}: {source}")),
            ),
        }
    }
}
