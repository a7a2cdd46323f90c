//! Periodic backup sweep over every configured tenant.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::registry::TenantRegistry;
use crate::service::{BackupOutcome, BackupService};

/// Counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Runs the same gated backup as `POST /backup/{tenant}` for each tenant on
/// a fixed interval. Tenants are handled one after the other.
pub struct BackupScheduler {
    registry: Arc<TenantRegistry>,
    backups: Arc<BackupService>,
    interval: Duration,
}

impl BackupScheduler {
    pub fn new(
        registry: Arc<TenantRegistry>,
        backups: Arc<BackupService>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            backups,
            interval,
        }
    }

    /// Back up every tenant once. A failing tenant does not stop the sweep.
    pub async fn run_once(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for tenant in self.registry.iter() {
            match self.backups.backup(tenant).await {
                Ok(BackupOutcome::Uploaded { artifact, .. }) => {
                    info!(tenant = %tenant.id, artifact = %artifact.name, "scheduled backup uploaded");
                    summary.uploaded += 1;
                }
                Ok(BackupOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    error!(tenant = %tenant.id, error = %e, "scheduled backup failed");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Sweep every `interval`, first one an interval after start, until
    /// `shutdown` is cancelled. A sweep in progress is finished first.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_seconds = self.interval.as_secs(), "backup scheduler starting");
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let summary = self.run_once().await;
                        info!(
                            uploaded = summary.uploaded,
                            skipped = summary.skipped,
                            failed = summary.failed,
                            "backup sweep finished"
                        );
                    }
                }
            }
            info!("backup scheduler stopped");
        })
    }
}
