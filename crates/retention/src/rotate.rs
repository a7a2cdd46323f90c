use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use pgvault_core::{ArtifactNaming, TenantId};
use pgvault_store::ArtifactStore;

use crate::error::RetentionError;
use crate::plan::{RetentionPlan, plan};
use crate::tier::RetentionSchedule;

/// Summary of one rotation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RotationReport {
    pub kept: usize,
    /// Names of the artifacts deleted (or that would be, in dry-run mode).
    pub deleted: Vec<String>,
    /// Names of the artifacts whose deletion failed.
    pub failed: Vec<String>,
    /// Artifacts skipped because their name carries no parseable time.
    pub ignored: usize,
    pub dry_run: bool,
}

/// Applies a [`RetentionSchedule`] to a tenant's backup folder.
pub struct Rotator {
    store: Arc<dyn ArtifactStore>,
    schedule: RetentionSchedule,
    naming: ArtifactNaming,
    tz: Tz,
    dry_run: bool,
}

impl Rotator {
    /// Rotator with the default schedule, bucketing calendar units in UTC.
    pub fn new(store: Arc<dyn ArtifactStore>, naming: ArtifactNaming) -> Self {
        Self {
            store,
            schedule: RetentionSchedule::default(),
            naming,
            tz: Tz::UTC,
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_schedule(mut self, schedule: RetentionSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Time zone used for day, week, month and year buckets.
    #[must_use]
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    /// Plan and report without deleting anything.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn schedule(&self) -> &RetentionSchedule {
        &self.schedule
    }

    /// List the tenant's artifacts in `folder` and plan which to keep.
    pub async fn preview(
        &self,
        tenant: &TenantId,
        folder: &str,
        now: DateTime<Utc>,
    ) -> Result<RetentionPlan, RetentionError> {
        let artifacts = self
            .store
            .list(folder, &self.naming.tenant_prefix(tenant))
            .await?;
        Ok(plan(
            &self.schedule,
            &artifacts,
            |artifact| self.naming.parse_time(tenant, &artifact.name),
            now,
            self.tz,
        ))
    }

    /// Delete every artifact of `tenant` in `folder` that no tier keeps.
    ///
    /// Only a failed listing aborts the pass. A failed deletion is logged and
    /// recorded, and the remaining deletions still run.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn rotate(
        &self,
        tenant: &TenantId,
        folder: &str,
        now: DateTime<Utc>,
    ) -> Result<RotationReport, RetentionError> {
        let plan = self.preview(tenant, folder, now).await?;
        for artifact in &plan.ignored {
            debug!(name = %artifact.name, "ignoring artifact without a parseable time");
        }

        let mut report = RotationReport {
            kept: plan.keep.len(),
            ignored: plan.ignored.len(),
            dry_run: self.dry_run,
            ..RotationReport::default()
        };
        for artifact in plan.delete {
            if self.dry_run {
                info!(name = %artifact.name, "would delete artifact");
                report.deleted.push(artifact.name);
                continue;
            }
            match self.store.delete(&artifact.id).await {
                Ok(()) => {
                    debug!(name = %artifact.name, "deleted artifact");
                    report.deleted.push(artifact.name);
                }
                Err(e) => {
                    warn!(name = %artifact.name, error = %e, "failed to delete artifact");
                    report.failed.push(artifact.name);
                }
            }
        }

        info!(
            kept = report.kept,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            ignored = report.ignored,
            dry_run = report.dry_run,
            "rotation finished"
        );
        Ok(report)
    }
}
