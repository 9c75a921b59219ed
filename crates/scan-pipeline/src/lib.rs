#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`queue`]: 단일 소비자 FIFO 큐 (empty→non-empty 전이 시에만 wake)
//! - [`scanner`]: 외부 스캐너 어댑터 trait 및 명령 기반 구현
//! - [`report`]: 스캐너 JSON 출력 모델 (전 필드 optional)
//! - [`fingerprint`]: 순서/대소문자/공백 불변 diff 지문 (SHA-256)
//! - [`scan`]: 스캔 파이프라인 (큐 소진 + 스캐너 호출)
//! - [`result`]: 결과 파이프라인 (diff 판정 + 웹훅 fan-out)
//! - [`reaper`]: 타임아웃 리퍼 (큐 멤버십 대조 수거)
//! - [`notify`]: 웹훅 전달 trait 및 URL 조립
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! scheduler -> scan queue -> ScanPipeline -> result queue -> ResultPipeline -> webhooks
//!                  |                                                |
//!            TimeoutReaper                                   fingerprint diff
//! ```

pub mod error;
pub mod fingerprint;
pub mod notify;
pub mod queue;
pub mod reaper;
pub mod report;
pub mod result;
pub mod scan;
pub mod scanner;

// --- 주요 타입 re-export ---

// 파이프라인
pub use result::{RawScanResult, ResultPipeline, ResultPipelineBuilder};
pub use scan::{ScanPipeline, ScanPipelineBuilder};

// 큐
pub use queue::SingleFlightQueue;

// 스캐너
pub use scanner::{CommandScanner, ScannerAdapter};

// 웹훅
pub use notify::{WebhookNotifier, build_webhook_url};

// 리퍼
pub use reaper::{SweepOutcome, TimeoutReaper};

// 지문
pub use fingerprint::compute_fingerprint;
pub use report::ScanReport;

// 에러
pub use error::ScanPipelineError;
