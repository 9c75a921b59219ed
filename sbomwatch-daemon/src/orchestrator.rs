//! Daemon orchestration -- assembly, queue wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `sbomwatch-daemon`.
//! It loads configuration, builds the store and both pipelines, wires
//! the shared queues, manages startup/shutdown ordering, and runs the
//! main event loop.
//!
//! # Startup Order (consumers before producers)
//!
//! 1. Result pipeline (consumes raw results)
//! 2. Scan pipeline (consumes SBOM ids, produces raw results)
//! 3. Timeout reaper loop
//! 4. Scanner DB update loop
//! 5. Rescan scheduler loop (produces SBOM ids)
//!
//! # Shutdown Order (producers first)
//!
//! 1. Scheduler, reaper, and db update loops (via cancellation token)
//! 2. Scan pipeline (stop producing raw results)
//! 3. Result pipeline (stop evaluating)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use sbomwatch_core::config::SbomwatchConfig;
use sbomwatch_core::pipeline::{HealthStatus, Pipeline};
use sbomwatch_core::store::MemoryStore;
use sbomwatch_core::types::SbomRecord;
use sbomwatch_scan_pipeline::{
    CommandScanner, RawScanResult, ResultPipeline, ResultPipelineBuilder, ScanPipeline,
    ScanPipelineBuilder, SingleFlightQueue, TimeoutReaper,
};

use crate::metrics_server;
use crate::notify::HttpWebhookNotifier;
use crate::scheduler::{
    DbUpdater, ScanScheduler, spawn_db_updater, spawn_reaper, spawn_scheduler,
};

/// The main daemon orchestrator.
#[derive(Debug)]
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: SbomwatchConfig,
    /// Shared store backing both pipelines.
    store: Arc<MemoryStore>,
    /// Scan queue, shared with the reaper and the scheduler.
    scan_queue: Arc<SingleFlightQueue<String>>,
    /// Scan pipeline (SBOM ids -> raw results).
    scan_pipeline: ScanPipeline<MemoryStore, CommandScanner>,
    /// Result pipeline (raw results -> diff evaluation -> webhooks).
    result_pipeline: ResultPipeline<MemoryStore, HttpWebhookNotifier>,
    /// Cancellation token shared by all background loops.
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    #[allow(dead_code)] // Public API for tests
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = SbomwatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Useful for testing or when CLI overrides have been applied.
    pub async fn build_from_config(config: SbomwatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before anything records metrics
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let store = Arc::new(MemoryStore::new());
        let loaded = load_sboms(&store, &config.general.data_dir).await?;
        tracing::info!(sboms = loaded, "store initialized");

        // Shared queues -- injected into every collaborator explicitly
        let scan_queue: Arc<SingleFlightQueue<String>> = Arc::new(SingleFlightQueue::new());
        let result_queue: Arc<SingleFlightQueue<RawScanResult>> =
            Arc::new(SingleFlightQueue::new());
        let cancel = CancellationToken::new();

        tracing::info!("initializing result pipeline");
        let notifier = Arc::new(HttpWebhookNotifier::new()?);
        let result_pipeline = ResultPipelineBuilder::new(Arc::clone(&store), notifier)
            .result_queue(Arc::clone(&result_queue))
            .cancel_token(cancel.child_token())
            .build();

        tracing::info!("initializing scan pipeline");
        let scanner = Arc::new(CommandScanner::from_core(
            &config.scanner,
            &config.general.data_dir,
        ));
        let scan_pipeline = ScanPipelineBuilder::new(Arc::clone(&store), scanner)
            .scan_queue(Arc::clone(&scan_queue))
            .result_queue(result_queue)
            .cancel_token(cancel.child_token())
            .build();

        tracing::info!("orchestrator initialized");

        Ok(Self {
            config,
            store,
            scan_queue,
            scan_pipeline,
            result_pipeline,
            cancel,
        })
    }

    /// Start all components and enter the main event loop.
    ///
    /// This method blocks until a shutdown signal is received.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        // Write PID file if configured
        if !self.config.general.pid_file.is_empty() {
            let path = Path::new(&self.config.general.pid_file);
            write_pid_file(path)?;
        }

        if let Err(e) = self.start_all().await {
            tracing::warn!("startup failed, rolling back already-started components");
            self.shutdown().await;
            if !self.config.general.pid_file.is_empty() {
                remove_pid_file(Path::new(&self.config.general.pid_file));
            }
            return Err(e);
        }

        // Main event loop
        tracing::info!("entering main event loop");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown().await;

        // Remove PID file
        if !self.config.general.pid_file.is_empty() {
            remove_pid_file(Path::new(&self.config.general.pid_file));
        }

        Ok(())
    }

    /// Start pipelines (consumers first) and background loops.
    async fn start_all(&mut self) -> Result<()> {
        self.result_pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start result pipeline: {}", e))?;
        self.scan_pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start scan pipeline: {}", e))?;

        if self.config.reaper.enabled {
            let reaper = TimeoutReaper::new(
                Arc::clone(&self.store),
                Arc::clone(&self.scan_queue),
                Duration::from_secs(self.config.reaper.stale_after_secs),
            );
            spawn_reaper(
                reaper,
                Duration::from_secs(self.config.reaper.sweep_interval_secs),
                self.cancel.child_token(),
            );
            tracing::info!(
                sweep_interval_secs = self.config.reaper.sweep_interval_secs,
                "timeout reaper started"
            );
        }

        if self.config.db_update.enabled {
            let updater = DbUpdater::from_config(&self.config.db_update);
            spawn_db_updater(
                updater,
                Duration::from_secs(self.config.db_update.interval_secs),
                self.cancel.child_token(),
            );
            tracing::info!(
                interval_secs = self.config.db_update.interval_secs,
                "scanner db updater started"
            );
        }

        if self.config.scheduler.enabled {
            let scheduler = ScanScheduler::new(
                Arc::clone(&self.store),
                Arc::clone(&self.scan_queue),
                Duration::from_secs(self.config.scheduler.rescan_after_secs),
            );
            spawn_scheduler(
                scheduler,
                Duration::from_secs(self.config.scheduler.interval_secs),
                self.cancel.child_token(),
            );
            tracing::info!(
                interval_secs = self.config.scheduler.interval_secs,
                "rescan scheduler started"
            );
        }

        Ok(())
    }

    /// Perform graceful shutdown: loops first, then producers, then consumers.
    async fn shutdown(&mut self) {
        tracing::info!("stopping background loops");
        self.cancel.cancel();

        if let Err(e) = self.scan_pipeline.stop().await {
            tracing::error!(error = %e, "failed to stop scan pipeline");
        }
        if let Err(e) = self.result_pipeline.stop().await {
            tracing::error!(error = %e, "failed to stop result pipeline");
        }
        tracing::info!("orchestrator shut down");
    }

    /// Aggregated health across both pipelines.
    #[allow(dead_code)] // Future health endpoint
    pub async fn health(&self) -> Vec<(&'static str, HealthStatus)> {
        vec![
            ("scan-pipeline", self.scan_pipeline.health_check().await),
            ("result-pipeline", self.result_pipeline.health_check().await),
        ]
    }

    /// Get a reference to the loaded configuration.
    #[allow(dead_code)] // Public API for introspection
    pub fn config(&self) -> &SbomwatchConfig {
        &self.config
    }

    /// Get the shared store handle.
    #[allow(dead_code)] // Public API for tests
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }
}

/// Load previously registered SBOM documents from `<data_dir>/sboms`.
///
/// Each `<id>.sbom.json` file becomes a store record with the file stem
/// as both id and display name. A missing directory is not an error --
/// the daemon may be starting on a fresh host.
async fn load_sboms(store: &MemoryStore, data_dir: &str) -> Result<usize> {
    let dir = Path::new(data_dir).join("sboms");
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %dir.display(), "sbom directory does not exist yet");
            return Ok(0);
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "failed to read sbom directory {}: {}",
                dir.display(),
                e
            ));
        }
    };

    let mut loaded = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(id) = name.strip_suffix(".sbom.json") else {
            continue;
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable sbom file");
                continue;
            }
        };

        store
            .insert_sbom(SbomRecord {
                id: id.to_owned(),
                name: id.to_owned(),
                content,
                created_at: entry
                    .metadata()
                    .await
                    .and_then(|m| m.created())
                    .unwrap_or_else(|_| std::time::SystemTime::now()),
            })
            .await;
        loaded += 1;
    }

    Ok(loaded)
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create the file (no TOCTOU race)
/// - Verifies the created file is a regular file (no symlink target)
/// - Creates the parent directory with restrictive permissions (0o700)
fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file (possible symlink attack)",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        file.set_permissions(permissions)?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use sbomwatch_core::store::ScanStore;

    use super::*;

    #[test]
    fn write_pid_file_creates_parent_directory() {
        let temp_dir = std::env::temp_dir();
        let test_dir = temp_dir.join(format!("sbomwatch_test_{}", std::process::id()));
        let pid_file = test_dir.join("subdir").join("test.pid");

        write_pid_file(&pid_file).expect("should create parent directory");
        assert!(pid_file.exists());

        let content = fs::read_to_string(&pid_file).expect("should read PID file");
        assert_eq!(content.trim(), std::process::id().to_string());

        let _ = fs::remove_dir_all(&test_dir);
    }

    #[test]
    fn write_pid_file_fails_if_already_exists() {
        let temp_dir = std::env::temp_dir();
        let pid_file = temp_dir.join(format!("sbomwatch_test_dup_{}.pid", std::process::id()));
        fs::write(&pid_file, "12345").expect("should write initial PID file");

        let err = write_pid_file(&pid_file).unwrap_err().to_string();
        assert!(err.contains("already exists"), "{err}");
        assert!(err.contains("12345"), "{err}");

        let _ = fs::remove_file(&pid_file);
    }

    #[test]
    fn remove_pid_file_handles_nonexistent_gracefully() {
        let temp_dir = std::env::temp_dir();
        let pid_file = temp_dir.join(format!(
            "sbomwatch_test_nonexist_{}.pid",
            std::process::id()
        ));
        assert!(!pid_file.exists());

        // Should not panic, only logs a warning
        remove_pid_file(&pid_file);
    }

    #[tokio::test]
    async fn load_sboms_reads_only_sbom_files() {
        let dir = tempfile::tempdir().unwrap();
        let sbom_dir = dir.path().join("sboms");
        fs::create_dir_all(&sbom_dir).unwrap();
        fs::write(sbom_dir.join("app-1.sbom.json"), r#"{"components": []}"#).unwrap();
        fs::write(sbom_dir.join("app-2.sbom.json"), r#"{"components": []}"#).unwrap();
        fs::write(sbom_dir.join("notes.txt"), "not an sbom").unwrap();

        let store = MemoryStore::new();
        let loaded = load_sboms(&store, dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(store.sbom_count().await, 2);
        assert!(
            store
                .sbom_content("app-1")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn load_sboms_tolerates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let loaded = load_sboms(&store, dir.path().join("nope").to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(loaded, 0);
    }

    #[tokio::test]
    async fn orchestrator_builds_from_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SbomwatchConfig::default();
        config.general.data_dir = dir.path().display().to_string();
        config.general.pid_file = String::new();
        config.metrics.enabled = false;

        let orchestrator = Orchestrator::build_from_config(config).await.unwrap();
        let health = orchestrator.health().await;
        assert_eq!(health.len(), 2);
        assert!(health.iter().all(|(_, status)| status.is_unhealthy()));
    }
}
