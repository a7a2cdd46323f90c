use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempPath;
use tracing::{info, instrument, warn};

use pgvault_core::{
    FolderKind, QualifiedTable, RestoreProgress, RestoreReport, RestoreState, TenantConfig,
};
use pgvault_dump::{backup_versions, read_dump_file};
use pgvault_postgres::RestoreEngine;
use pgvault_store::ArtifactStore;

use crate::error::ApiError;
use crate::lock::TenantLocks;

/// Download, parse, and replay a stored backup into a tenant database.
pub struct RestoreService {
    store: Arc<dyn ArtifactStore>,
    engine: Arc<dyn RestoreEngine>,
    locks: Arc<TenantLocks>,
    work_dir: Option<PathBuf>,
}

impl RestoreService {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        engine: Arc<dyn RestoreEngine>,
        locks: Arc<TenantLocks>,
    ) -> Self {
        Self {
            store,
            engine,
            locks,
            work_dir: None,
        }
    }

    /// Directory for the downloaded dump. Defaults to the system temporary
    /// directory.
    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Restore artifact `artifact_id` into `tenant`.
    ///
    /// `progress` must be in [`RestoreState::Authorized`]; it ends in
    /// `Committed` on success and `RolledBack` on any error.
    pub async fn restore(
        &self,
        tenant: &TenantConfig,
        artifact_id: &str,
        strict: bool,
        progress: &mut RestoreProgress,
    ) -> Result<RestoreReport, ApiError> {
        let result = self.run(tenant, artifact_id, strict, progress).await;
        if result.is_err() && !progress.state().is_terminal() {
            progress.roll_back();
        }
        result
    }

    #[instrument(skip(self, tenant, progress), fields(tenant = %tenant.id))]
    async fn run(
        &self,
        tenant: &TenantConfig,
        artifact_id: &str,
        strict: bool,
        progress: &mut RestoreProgress,
    ) -> Result<RestoreReport, ApiError> {
        let folder = tenant.folder(FolderKind::Backup)?;
        let _guard = self.locks.acquire(tenant, "restore").await?;

        let artifact = self.store.metadata(artifact_id).await?;
        if artifact.folder != folder {
            warn!(artifact = %artifact.id, folder = %artifact.folder, "artifact outside the tenant backup folder");
            return Err(ApiError::BadRequest(
                "artifact is not in the tenant backup folder".to_owned(),
            ));
        }

        let scratch = self.scratch_file()?;
        let bytes = self.store.download(&artifact.id, &scratch).await?;
        progress.advance(RestoreState::Downloaded)?;
        info!(name = %artifact.name, bytes, "backup downloaded");

        let retain: HashSet<QualifiedTable> = tenant.retained_tables().into_iter().collect();
        let dump = read_dump_file(&scratch, &retain).await?;
        progress.advance(RestoreState::Parsed)?;
        if dump.truncated {
            warn!("backup ends inside a copy-block, only complete blocks are restored");
        }
        if !dump.anomalies.is_empty() {
            warn!(anomalies = dump.anomalies.len(), "backup has rows or blocks that were skipped");
        }

        let backup = backup_versions(&dump, &tenant.metadata_table, tenant.version_offset);
        info!(
            rows = dump.total_rows(),
            backup_schema = backup.schema_version.as_deref().unwrap_or("unknown"),
            strict,
            "backup parsed"
        );
        Ok(self
            .engine
            .restore(tenant, &dump, &backup, strict, progress)
            .await?)
    }

    /// Removed when dropped, on every exit path.
    fn scratch_file(&self) -> Result<TempPath, ApiError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pgvault-restore-").suffix(".sql");
        let file = match &self.work_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| ApiError::Internal(format!("cannot create scratch file: {e}")))?;
        Ok(file.into_temp_path())
    }
}
