use std::path::Path;

use async_trait::async_trait;
use pgvault_core::Artifact;

use crate::error::StoreError;

/// Remote hierarchical storage for dump artifacts.
///
/// Every operation is folder-scoped: callers resolve the tenant's folder id
/// first and never pass folder ids taken from request input. Payloads move
/// between the store and local files so that dumps are never held in memory.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Short backend name used in logs (`memory`, `s3`).
    fn backend_name(&self) -> &'static str;

    /// Verify that `folder` exists.
    ///
    /// Returns [`StoreError::FolderNotFound`] rather than a generic failure
    /// when it does not.
    async fn ensure_folder(&self, folder: &str) -> Result<(), StoreError>;

    /// Upload the file at `source` as `name` inside `folder`.
    async fn upload(&self, folder: &str, name: &str, source: &Path)
    -> Result<Artifact, StoreError>;

    /// List artifacts in `folder` whose name starts with `name_prefix`,
    /// newest first.
    async fn list(&self, folder: &str, name_prefix: &str) -> Result<Vec<Artifact>, StoreError>;

    /// Fetch the metadata of one artifact.
    async fn metadata(&self, id: &str) -> Result<Artifact, StoreError>;

    /// Stream an artifact into `dest`, returning the number of bytes written.
    async fn download(&self, id: &str, dest: &Path) -> Result<u64, StoreError>;

    /// Delete an artifact. Deleting an artifact that does not exist succeeds.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Sort artifacts newest first, breaking ties by name so listings are stable.
pub fn sort_newest_first(artifacts: &mut [Artifact]) {
    artifacts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.name.cmp(&a.name))
    });
}
