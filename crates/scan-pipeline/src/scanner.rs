//! 스캐너 어댑터 — 외부 취약점 스캐너 호출 seam
//!
//! [`ScannerAdapter`]는 스캔 파이프라인이 요구하는 유일한 인터페이스로,
//! SBOM 문서를 받아 원시 JSON 리포트를 돌려줍니다. 기본 구현
//! [`CommandScanner`]는 SBOM을 파일로 기록한 뒤 설정된 외부 명령을
//! 실행합니다. 스캐너는 재진입 불가 프로세스로 취급되며, 동시 실행
//! 제한은 호출측(스캔 큐의 직렬화)이 보장합니다.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use sbomwatch_core::config::ScannerConfig;

use crate::error::ScanPipelineError;

/// stderr를 에러 메시지로 옮길 때의 최대 길이
const STDERR_SNIPPET_MAX: usize = 512;

/// 외부 스캐너 호출 인터페이스
pub trait ScannerAdapter: Send + Sync {
    /// SBOM 문서를 스캔하고 원시 리포트 텍스트를 반환합니다.
    ///
    /// 호출은 drain 루프를 중단시키는 suspension point이며,
    /// 완료(또는 실패)까지 다음 항목은 처리되지 않습니다.
    fn scan(
        &self,
        sbom_id: &str,
        sbom_content: &str,
    ) -> impl Future<Output = Result<String, ScanPipelineError>> + Send;
}

/// 외부 명령 기반 스캐너
///
/// SBOM을 `<sbom_dir>/<id>.sbom.json`에 기록하고
/// `<command> <args..> sbom:<path>`를 실행하여 stdout을 리포트로
/// 사용합니다. 비정상 종료는 호출 실패로 취급됩니다.
#[derive(Debug, Clone)]
pub struct CommandScanner {
    command: String,
    args: Vec<String>,
    sbom_dir: PathBuf,
}

impl CommandScanner {
    /// 새 스캐너를 생성합니다.
    pub fn new(command: impl Into<String>, args: Vec<String>, sbom_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args,
            sbom_dir: sbom_dir.into(),
        }
    }

    /// 코어 설정에서 스캐너를 구성합니다.
    ///
    /// SBOM 파일은 `<data_dir>/sboms` 아래에 기록됩니다.
    pub fn from_core(config: &ScannerConfig, data_dir: &str) -> Self {
        Self::new(
            config.command.clone(),
            config.args.clone(),
            PathBuf::from(data_dir).join("sboms"),
        )
    }

    /// SBOM 파일 경로를 반환합니다.
    fn sbom_path(&self, sbom_id: &str) -> PathBuf {
        self.sbom_dir.join(format!("{sbom_id}.sbom.json"))
    }
}

impl ScannerAdapter for CommandScanner {
    async fn scan(&self, sbom_id: &str, sbom_content: &str) -> Result<String, ScanPipelineError> {
        tokio::fs::create_dir_all(&self.sbom_dir)
            .await
            .map_err(|e| ScanPipelineError::Io {
                path: self.sbom_dir.display().to_string(),
                source: e,
            })?;

        let path = self.sbom_path(sbom_id);
        tokio::fs::write(&path, sbom_content)
            .await
            .map_err(|e| ScanPipelineError::Io {
                path: path.display().to_string(),
                source: e,
            })?;

        debug!(sbom_id, command = %self.command, "invoking external scanner");

        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(format!("sbom:{}", path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ScanPipelineError::Scanner {
                reason: format!("{}: {e}", self.command),
            })?;

        if !output.status.success() {
            let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            if stderr.len() > STDERR_SNIPPET_MAX {
                let mut cut = STDERR_SNIPPET_MAX;
                while !stderr.is_char_boundary(cut) {
                    cut -= 1;
                }
                stderr.truncate(cut);
            }
            return Err(ScanPipelineError::ScannerExit {
                status: output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_owned(), |c| format!("exit code {c}")),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
