use std::sync::Arc;

use pgvault_store::{ArtifactStore, TimeoutStore};
use pgvault_store_memory::MemoryArtifactStore;
#[cfg(feature = "s3")]
use pgvault_store_s3::{S3ArtifactStore, S3StoreConfig};

use crate::config::StorageConfig;
use crate::error::ServerError;
use crate::registry::TenantRegistry;

/// Create the artifact store from the given configuration.
///
/// Every call on the returned store is bounded by `timeout`. The memory
/// backend starts with the backup folder of every tenant already created.
#[allow(clippy::unused_async)]
pub async fn create_store(
    config: &StorageConfig,
    registry: &TenantRegistry,
    timeout: std::time::Duration,
) -> Result<Arc<dyn ArtifactStore>, ServerError> {
    let store: Arc<dyn ArtifactStore> = match config.backend.as_str() {
        "memory" => {
            let store = MemoryArtifactStore::new();
            for tenant in registry.iter() {
                if let Some(folder) = tenant.folders.backup.as_deref() {
                    store.create_folder(folder);
                }
            }
            Arc::new(store)
        }
        #[cfg(feature = "s3")]
        "s3" => {
            let bucket = config.bucket.as_deref().ok_or_else(|| {
                ServerError::Config("s3 storage backend requires [storage] bucket".into())
            })?;
            let mut s3_config = S3StoreConfig::new(bucket, &config.region)
                .with_key_prefix(&config.key_prefix)
                .with_path_style(config.force_path_style);
            if let Some(endpoint) = &config.endpoint_url {
                s3_config = s3_config.with_endpoint_url(endpoint);
            }
            Arc::new(S3ArtifactStore::new(s3_config).await)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unsupported storage backend: {other}"
            )));
        }
    };
    tracing::info!(backend = store.backend_name(), "artifact store ready");
    Ok(Arc::new(TimeoutStore::new(store, timeout)))
}
