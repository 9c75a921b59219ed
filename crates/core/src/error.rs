//! 에러 타입 — 도메인별 에러 정의

/// Sbomwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SbomwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 스캔 처리 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// 스토어 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중인 파이프라인을 다시 시작함
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인을 정지함
    #[error("pipeline not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 스캔 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 외부 스캐너 호출 실패
    #[error("scanner invocation failed: {0}")]
    ScannerFailed(String),

    /// 스캔 결과 파싱 실패
    #[error("malformed scan report: {0}")]
    MalformedReport(String),

    /// 웹훅 전달 실패
    #[error("webhook delivery failed: {0}")]
    Notify(String),
}

/// 스토어 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 엔티티를 찾을 수 없음
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = SbomwatchError::Config(ConfigError::FileNotFound {
            path: "/etc/sbomwatch/sbomwatch.toml".to_owned(),
        });
        assert!(err.to_string().contains("sbomwatch.toml"));
    }

    #[test]
    fn invalid_value_display() {
        let err = ConfigError::InvalidValue {
            field: "general.log_level".to_owned(),
            reason: "must be one of: trace, debug, info, warn, error".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("general.log_level"));
        assert!(msg.contains("must be one of"));
    }

    #[test]
    fn pipeline_error_conversion() {
        let err: SbomwatchError = PipelineError::AlreadyRunning.into();
        assert!(matches!(err, SbomwatchError::Pipeline(_)));
    }

    #[test]
    fn scan_error_display() {
        let err = ScanError::MalformedReport("unexpected end of input".to_owned());
        assert!(err.to_string().contains("malformed scan report"));
    }

    #[test]
    fn store_error_not_found_display() {
        let err = StoreError::NotFound {
            entity: "sbom".to_owned(),
            id: "abc-123".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sbom"));
        assert!(msg.contains("abc-123"));
    }

    #[test]
    fn io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: SbomwatchError = io.into();
        assert!(matches!(err, SbomwatchError::Io(_)));
    }
}
