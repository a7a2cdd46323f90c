use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pgvault_core::Artifact;
use tracing::warn;

use crate::error::StoreError;
use crate::store::ArtifactStore;

/// Wraps a store so every call fails with [`StoreError::Timeout`] once it
/// runs longer than `limit`.
pub struct TimeoutStore {
    inner: Arc<dyn ArtifactStore>,
    limit: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn ArtifactStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        if let Ok(result) = tokio::time::timeout(self.limit, fut).await {
            result
        } else {
            warn!(
                backend = self.inner.backend_name(),
                operation,
                limit_secs = self.limit.as_secs(),
                "storage call timed out"
            );
            Err(StoreError::Timeout(format!(
                "{operation} exceeded {}s",
                self.limit.as_secs()
            )))
        }
    }
}

#[async_trait]
impl ArtifactStore for TimeoutStore {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn ensure_folder(&self, folder: &str) -> Result<(), StoreError> {
        self.bounded("ensure_folder", self.inner.ensure_folder(folder))
            .await
    }

    async fn upload(
        &self,
        folder: &str,
        name: &str,
        source: &Path,
    ) -> Result<Artifact, StoreError> {
        self.bounded("upload", self.inner.upload(folder, name, source))
            .await
    }

    async fn list(&self, folder: &str, name_prefix: &str) -> Result<Vec<Artifact>, StoreError> {
        self.bounded("list", self.inner.list(folder, name_prefix))
            .await
    }

    async fn metadata(&self, id: &str) -> Result<Artifact, StoreError> {
        self.bounded("metadata", self.inner.metadata(id)).await
    }

    async fn download(&self, id: &str, dest: &Path) -> Result<u64, StoreError> {
        self.bounded("download", self.inner.download(id, dest))
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.bounded("delete", self.inner.delete(id)).await
    }
}
