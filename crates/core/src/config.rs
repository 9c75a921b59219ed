//! 설정 관리 — sbomwatch.toml 파싱 및 런타임 설정
//!
//! [`SbomwatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SBOMWATCH_SCANNER_COMMAND=grype` 형식)
//! 3. 설정 파일 (`sbomwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), sbomwatch_core::error::SbomwatchError> {
//! use sbomwatch_core::config::SbomwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SbomwatchConfig::load("sbomwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SbomwatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SbomwatchError};

/// Sbomwatch 통합 설정
///
/// `sbomwatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SbomwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 외부 스캐너 설정
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// 재스캔 스케줄러 설정
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// 타임아웃 리퍼 설정
    #[serde(default)]
    pub reaper: ReaperConfig,
    /// 스캐너 취약점 DB 갱신 설정
    #[serde(default)]
    pub db_update: DbUpdateConfig,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl SbomwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SbomwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SbomwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SbomwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SbomwatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SbomwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            SbomwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SBOMWATCH_{SECTION}_{FIELD}`
    /// 예: `SBOMWATCH_SCANNER_COMMAND=grype`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SBOMWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SBOMWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "SBOMWATCH_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "SBOMWATCH_GENERAL_PID_FILE");

        // Scanner
        override_string(&mut self.scanner.command, "SBOMWATCH_SCANNER_COMMAND");
        override_csv(&mut self.scanner.args, "SBOMWATCH_SCANNER_ARGS");

        // Scheduler
        override_bool(&mut self.scheduler.enabled, "SBOMWATCH_SCHEDULER_ENABLED");
        override_u64(
            &mut self.scheduler.interval_secs,
            "SBOMWATCH_SCHEDULER_INTERVAL_SECS",
        );
        override_u64(
            &mut self.scheduler.rescan_after_secs,
            "SBOMWATCH_SCHEDULER_RESCAN_AFTER_SECS",
        );

        // Reaper
        override_bool(&mut self.reaper.enabled, "SBOMWATCH_REAPER_ENABLED");
        override_u64(
            &mut self.reaper.sweep_interval_secs,
            "SBOMWATCH_REAPER_SWEEP_INTERVAL_SECS",
        );
        override_u64(
            &mut self.reaper.stale_after_secs,
            "SBOMWATCH_REAPER_STALE_AFTER_SECS",
        );

        // DB update
        override_bool(&mut self.db_update.enabled, "SBOMWATCH_DB_UPDATE_ENABLED");
        override_u64(
            &mut self.db_update.interval_secs,
            "SBOMWATCH_DB_UPDATE_INTERVAL_SECS",
        );
        override_string(&mut self.db_update.command, "SBOMWATCH_DB_UPDATE_COMMAND");
        override_csv(&mut self.db_update.args, "SBOMWATCH_DB_UPDATE_ARGS");

        // Metrics
        override_bool(&mut self.metrics.enabled, "SBOMWATCH_METRICS_ENABLED");
        override_u16(&mut self.metrics.port, "SBOMWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SbomwatchError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 스캐너 명령 검증
        if self.scanner.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scanner.command".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        // 스케줄러 검증
        if self.scheduler.enabled && self.scheduler.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.interval_secs".to_owned(),
                reason: "must be greater than 0 when scheduler is enabled".to_owned(),
            }
            .into());
        }

        // 리퍼 검증
        if self.reaper.enabled {
            if self.reaper.sweep_interval_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "reaper.sweep_interval_secs".to_owned(),
                    reason: "must be greater than 0 when reaper is enabled".to_owned(),
                }
                .into());
            }
            if self.reaper.stale_after_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "reaper.stale_after_secs".to_owned(),
                    reason: "must be greater than 0 when reaper is enabled".to_owned(),
                }
                .into());
            }
        }

        // DB 갱신 검증
        if self.db_update.enabled {
            if self.db_update.interval_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "db_update.interval_secs".to_owned(),
                    reason: "must be greater than 0 when db update is enabled".to_owned(),
                }
                .into());
            }
            if self.db_update.command.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "db_update.command".to_owned(),
                    reason: "must not be empty when db update is enabled".to_owned(),
                }
                .into());
            }
        }

        // 메트릭 포트 검증
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metrics.port".to_owned(),
                reason: "must be greater than 0 when metrics are enabled".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리 (SBOM 문서는 `<data_dir>/sboms` 아래)
    pub data_dir: String,
    /// PID 파일 경로
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/sbomwatch".to_owned(),
            pid_file: "/var/run/sbomwatch.pid".to_owned(),
        }
    }
}

/// 외부 스캐너 설정
///
/// 스캐너는 SBOM 파일 경로를 받아 JSON 리포트를 stdout으로
/// 내보내는 외부 프로세스입니다. 동시에 하나만 실행됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// 스캐너 실행 파일
    pub command: String,
    /// 스캐너 인자 (SBOM 경로는 `sbom:<path>` 형식으로 마지막에 추가됨)
    pub args: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            command: "grype".to_owned(),
            args: vec![
                "--add-cpes-if-none".to_owned(),
                "-o".to_owned(),
                "json".to_owned(),
            ],
        }
    }
}

/// 재스캔 스케줄러 설정
///
/// 스캔 이력이 없거나 마지막 스캔이 오래된 SBOM을 주기적으로
/// 스캔 큐에 넣습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 스케줄링 주기 (초)
    pub interval_secs: u64,
    /// 재스캔 기준 경과 시간 (초)
    pub rescan_after_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            rescan_after_secs: 12 * 60 * 60,
        }
    }
}

/// 타임아웃 리퍼 설정
///
/// 기준 시간을 넘긴 PENDING 스캔 중 큐에서도 빠져 있는 것을
/// FAILED로 정리합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 스윕 주기 (초)
    pub sweep_interval_secs: u64,
    /// 타임아웃 기준 경과 시간 (초)
    pub stale_after_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: 1,
            stale_after_secs: 12 * 60 * 60,
        }
    }
}

/// 스캐너 취약점 DB 갱신 설정
///
/// 외부 스캐너의 취약점 데이터베이스를 주기적으로 갱신하여
/// 새로 공개된 권고가 스캔 결과에 반영되도록 합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbUpdateConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 갱신 주기 (초)
    pub interval_secs: u64,
    /// 갱신 명령
    pub command: String,
    /// 갱신 명령 인자
    pub args: Vec<String>,
}

impl Default for DbUpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 12 * 60 * 60,
            command: "grype".to_owned(),
            args: vec!["db".to_owned(), "update".to_owned()],
        }
    }
}

/// 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// Prometheus HTTP 리스너 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9469,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

fn override_bool(target: &mut bool, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => *target = true,
            "false" | "0" | "no" => *target = false,
            other => warn!(var, value = other, "ignoring invalid boolean env override"),
        }
    }
}

fn override_u64(target: &mut u64, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(var, value = %value, "ignoring invalid integer env override"),
        }
    }
}

fn override_u16(target: &mut u16, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(var, value = %value, "ignoring invalid integer env override"),
        }
    }
}

fn override_csv(target: &mut Vec<String>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = value
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
