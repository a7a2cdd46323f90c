use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use tracing::debug;

use pgvault_core::Artifact;
use pgvault_store::store::sort_newest_first;
use pgvault_store::{ArtifactStore, StoreError};

struct StoredArtifact {
    artifact: Artifact,
    data: Bytes,
}

/// In-memory implementation of [`ArtifactStore`] backed by [`DashMap`].
///
/// Folders must be created explicitly with [`MemoryArtifactStore::create_folder`].
/// Intended for tests and local development; contents are lost on exit.
#[derive(Default)]
pub struct MemoryArtifactStore {
    folders: DashSet<String>,
    artifacts: DashMap<String, StoredArtifact>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a folder so that uploads into it succeed.
    pub fn create_folder(&self, folder: impl Into<String>) {
        self.folders.insert(folder.into());
    }

    /// Store an artifact with an explicit creation time, bypassing the file
    /// system. Returns the new artifact.
    pub fn insert(
        &self,
        folder: &str,
        name: &str,
        created_at: DateTime<Utc>,
        data: impl Into<Bytes>,
    ) -> Artifact {
        let data = data.into();
        let artifact = Artifact {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.to_owned(),
            created_at,
            folder: folder.to_owned(),
            size_bytes: Some(data.len() as u64),
        };
        self.artifacts.insert(
            artifact.id.clone(),
            StoredArtifact {
                artifact: artifact.clone(),
                data,
            },
        );
        artifact
    }

    /// Number of artifacts across all folders.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    fn check_folder(&self, folder: &str) -> Result<(), StoreError> {
        if self.folders.contains(folder) {
            Ok(())
        } else {
            Err(StoreError::FolderNotFound(folder.to_owned()))
        }
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_folder(&self, folder: &str) -> Result<(), StoreError> {
        self.check_folder(folder)
    }

    async fn upload(
        &self,
        folder: &str,
        name: &str,
        source: &Path,
    ) -> Result<Artifact, StoreError> {
        self.check_folder(folder)?;
        let data = tokio::fs::read(source).await?;
        debug!(folder, name, bytes = data.len(), "storing artifact in memory");
        Ok(self.insert(folder, name, Utc::now(), data))
    }

    async fn list(&self, folder: &str, name_prefix: &str) -> Result<Vec<Artifact>, StoreError> {
        self.check_folder(folder)?;
        let mut listed: Vec<Artifact> = self
            .artifacts
            .iter()
            .filter(|entry| {
                entry.artifact.folder == folder && entry.artifact.name.starts_with(name_prefix)
            })
            .map(|entry| entry.artifact.clone())
            .collect();
        sort_newest_first(&mut listed);
        Ok(listed)
    }

    async fn metadata(&self, id: &str) -> Result<Artifact, StoreError> {
        self.artifacts
            .get(id)
            .map(|entry| entry.artifact.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }

    async fn download(&self, id: &str, dest: &Path) -> Result<u64, StoreError> {
        // Clone the handle so the map shard is not locked across the write.
        let data = self
            .artifacts
            .get(id)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;
        tokio::fs::write(dest, &data).await?;
        Ok(data.len() as u64)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if self.artifacts.remove(id).is_none() {
            debug!(id, "delete of absent artifact treated as success");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pgvault_store::testing::run_store_conformance_tests;

    use super::*;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryArtifactStore::new();
        store.create_folder("backups");
        run_store_conformance_tests(&store, "backups").await.unwrap();
    }

    #[tokio::test]
    async fn list_is_scoped_to_folder() {
        let store = MemoryArtifactStore::new();
        store.create_folder("a");
        store.create_folder("b");
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store.insert("a", "backup_T_20240101T000000.sql", at, "x");
        store.insert("b", "backup_T_20240101T000000.sql", at, "y");

        let listed = store.list("a", "backup_T_").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].folder, "a");
    }

    #[tokio::test]
    async fn insert_preserves_explicit_times() {
        let store = MemoryArtifactStore::new();
        store.create_folder("f");
        let older = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store.insert("f", "old", older, "1");
        store.insert("f", "new", newer, "2");

        let listed = store.list("f", "").await.unwrap();
        assert_eq!(listed[0].name, "new");
        assert_eq!(listed[1].created_at, older);
    }

    #[tokio::test]
    async fn list_on_missing_folder_fails() {
        let store = MemoryArtifactStore::new();
        let err = store.list("nope", "").await.unwrap_err();
        assert!(matches!(err, StoreError::FolderNotFound(_)));
    }
}
