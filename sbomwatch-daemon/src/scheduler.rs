//! Periodic background tasks: the rescan scheduler, the timeout reaper,
//! and the scanner DB updater.
//!
//! The scheduler finds SBOMs that are due for a scan (never scanned, or
//! all scans settled and older than the rescan threshold), creates a
//! PENDING scan row for each, and enqueues the SBOM id on the shared
//! scan queue. The reaper sweep runs on its own cadence and is defined
//! in `sbomwatch-scan-pipeline`; this module only drives it. The DB
//! updater refreshes the external scanner's vulnerability database so
//! rescans pick up newly published advisories.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sbomwatch_core::config::DbUpdateConfig;
use sbomwatch_core::error::SbomwatchError;
use sbomwatch_core::metrics::{DB_UPDATES_TOTAL, LABEL_RESULT, SCAN_QUEUE_DEPTH};
use sbomwatch_core::store::ScanStore;
use sbomwatch_scan_pipeline::{SingleFlightQueue, TimeoutReaper};

/// Rescan scheduler.
///
/// Shares the scan queue with the scan pipeline and the reaper; the
/// queue instance is injected, never global.
pub struct ScanScheduler<S> {
    store: Arc<S>,
    scan_queue: Arc<SingleFlightQueue<String>>,
    rescan_after: Duration,
}

impl<S> ScanScheduler<S>
where
    S: ScanStore,
{
    /// Create a scheduler over the given store and scan queue.
    pub fn new(
        store: Arc<S>,
        scan_queue: Arc<SingleFlightQueue<String>>,
        rescan_after: Duration,
    ) -> Self {
        Self {
            store,
            scan_queue,
            rescan_after,
        }
    }

    /// Run one scheduling pass.
    ///
    /// Returns the number of scans enqueued. SBOMs with a PENDING scan
    /// are never due, so a slow scanner cannot cause double submission.
    pub async fn tick(&self) -> Result<usize, SbomwatchError> {
        let due = self
            .store
            .sboms_due_for_scan(self.rescan_after)
            .await
            .map_err(SbomwatchError::Store)?;
        if due.is_empty() {
            return Ok(0);
        }

        let mut enqueued = 0usize;
        for sbom_id in due {
            match self.store.create_pending_scan(&sbom_id).await {
                Ok(scan) => {
                    debug!(sbom_id, scan_id = %scan.id, "scan scheduled");
                    self.scan_queue.enqueue(sbom_id);
                    enqueued += 1;
                }
                Err(e) => {
                    warn!(sbom_id, error = %e, "failed to create pending scan");
                }
            }
        }
        gauge!(SCAN_QUEUE_DEPTH).set(self.scan_queue.len() as f64);

        Ok(enqueued)
    }
}

/// Spawn the scheduler loop.
///
/// Ticks immediately on startup, then on the given interval until the
/// cancellation token fires.
pub fn spawn_scheduler<S>(
    scheduler: ScanScheduler<S>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    S: ScanStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match scheduler.tick().await {
                        Ok(0) => {}
                        Ok(enqueued) => info!(enqueued, "rescan scheduler enqueued scans"),
                        Err(e) => error!(error = %e, "rescan scheduler tick failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("rescan scheduler shutting down");
                    break;
                }
            }
        }
    })
}

/// Scanner vulnerability database updater.
///
/// Runs the configured update command (default `grype db update`) on a
/// fixed cadence, once immediately at startup and then on the interval.
pub struct DbUpdater {
    command: String,
    args: Vec<String>,
}

impl DbUpdater {
    /// Build an updater from its config section.
    pub fn from_config(config: &DbUpdateConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }

    /// Run one update pass.
    pub async fn run_once(&self) -> Result<()> {
        info!(command = %self.command, "updating scanner vulnerability database");

        let output = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                counter!(DB_UPDATES_TOTAL, LABEL_RESULT => "failure").increment(1);
                anyhow::anyhow!("failed to run {}: {}", self.command, e)
            })?;

        if !output.status.success() {
            counter!(DB_UPDATES_TOTAL, LABEL_RESULT => "failure").increment(1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            ));
        }

        counter!(DB_UPDATES_TOTAL, LABEL_RESULT => "success").increment(1);
        info!(command = %self.command, "scanner vulnerability database updated");
        Ok(())
    }
}

/// Spawn the scanner DB update loop.
pub fn spawn_db_updater(
    updater: DbUpdater,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = updater.run_once().await {
                        error!(error = %e, "scanner db update failed");
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("scanner db updater shutting down");
                    break;
                }
            }
        }
    })
}

/// Spawn the timeout reaper loop.
pub fn spawn_reaper<S>(
    reaper: TimeoutReaper<S>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    S: ScanStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = reaper.sweep().await {
                        error!(error = %e, "timeout sweep failed");
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("timeout reaper shutting down");
                    break;
                }
            }
        }
    })
}
