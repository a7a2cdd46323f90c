use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use pgvault_core::{
    Artifact, ArtifactNaming, FolderKind, GateDecision, ProceedReason, TenantConfig,
};
use pgvault_dump::Dumper;
use pgvault_postgres::WatermarkStore;
use pgvault_retention::{RotationReport, Rotator};
use pgvault_store::ArtifactStore;

use crate::error::ApiError;
use crate::lock::TenantLocks;

/// Result of a backup request.
#[derive(Debug)]
pub enum BackupOutcome {
    Uploaded {
        artifact: Artifact,
        /// `None` when rotation is disabled or failed.
        rotation: Option<RotationReport>,
    },
    /// Nothing changed since the last export.
    Skipped {
        last_export: DateTime<Utc>,
        last_mutation: DateTime<Utc>,
    },
}

/// Gate, dump, upload, record, rotate.
pub struct BackupService {
    store: Arc<dyn ArtifactStore>,
    dumper: Arc<dyn Dumper>,
    watermarks: Arc<dyn WatermarkStore>,
    rotator: Option<Rotator>,
    naming: ArtifactNaming,
    locks: Arc<TenantLocks>,
}

impl BackupService {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        dumper: Arc<dyn Dumper>,
        watermarks: Arc<dyn WatermarkStore>,
        naming: ArtifactNaming,
        locks: Arc<TenantLocks>,
    ) -> Self {
        Self {
            store,
            dumper,
            watermarks,
            rotator: None,
            naming,
            locks,
        }
    }

    /// Rotate the backup folder after every upload.
    #[must_use]
    pub fn with_rotator(mut self, rotator: Rotator) -> Self {
        self.rotator = Some(rotator);
        self
    }

    pub fn naming(&self) -> &ArtifactNaming {
        &self.naming
    }

    /// Back up `tenant` unless its data did not change since the last export.
    ///
    /// Only a failed dump or upload fails the request. Recording the export
    /// watermark and rotating old artifacts are best effort.
    #[instrument(skip_all, fields(tenant = %tenant.id))]
    pub async fn backup(&self, tenant: &TenantConfig) -> Result<BackupOutcome, ApiError> {
        let folder = tenant.folder(FolderKind::Backup)?;
        let _guard = self.locks.acquire(tenant, "backup").await?;
        self.store.ensure_folder(folder).await?;

        match self.gate(tenant).await {
            GateDecision::Skip {
                last_export,
                last_mutation,
            } => {
                info!(%last_export, %last_mutation, "backup skipped, data unchanged since last export");
                return Ok(BackupOutcome::Skipped {
                    last_export,
                    last_mutation,
                });
            }
            GateDecision::Proceed(reason) => debug!(?reason, "backup needed"),
        }

        let started = Utc::now();
        let dump = self.dumper.dump(tenant).await?;
        let name = self.naming.name_for(&tenant.id, started);
        let artifact = self.store.upload(folder, &name, dump.path()).await?;
        if let Err(e) = dump.close() {
            warn!(error = %e, "failed to remove scratch dump");
        }
        info!(id = %artifact.id, name = %artifact.name, bytes = ?artifact.size_bytes, "backup uploaded");

        if let Err(e) = self.watermarks.record_export(tenant, started).await {
            warn!(error = %e, "failed to record export watermark");
        }

        let rotation = match &self.rotator {
            Some(rotator) => match rotator.rotate(&tenant.id, folder, Utc::now()).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "rotation after upload failed");
                    None
                }
            },
            None => None,
        };

        Ok(BackupOutcome::Uploaded { artifact, rotation })
    }

    /// An unreadable watermark never blocks a backup.
    async fn gate(&self, tenant: &TenantConfig) -> GateDecision {
        match self.watermarks.read(tenant).await {
            Ok(watermarks) => watermarks.decide(),
            Err(e) => {
                warn!(error = %e, "could not read export watermarks, backing up anyway");
                GateDecision::Proceed(ProceedReason::Unreadable)
            }
        }
    }

    /// The tenant's artifacts, newest first.
    #[instrument(skip_all, fields(tenant = %tenant.id))]
    pub async fn list(&self, tenant: &TenantConfig) -> Result<Vec<Artifact>, ApiError> {
        let folder = tenant.folder(FolderKind::Backup)?;
        let artifacts = self
            .store
            .list(folder, &self.naming.tenant_prefix(&tenant.id))
            .await?;
        debug!(count = artifacts.len(), "listed backups");
        Ok(artifacts)
    }
}
