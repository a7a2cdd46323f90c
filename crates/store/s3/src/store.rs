use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::{ByteStream, DateTime as S3DateTime};
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use pgvault_core::Artifact;
use pgvault_store::store::sort_newest_first;
use pgvault_store::{ArtifactStore, StoreError};

use crate::config::{S3StoreConfig, build_client};
use crate::error::classify_sdk_error;

fn to_chrono(ts: Option<&S3DateTime>) -> DateTime<Utc> {
    ts.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_default()
}

/// S3-compatible implementation of [`ArtifactStore`].
///
/// Artifact ids are full object keys. A folder exists when its marker
/// object (`{prefix}{folder}/`) exists or when any object lives under it.
pub struct S3ArtifactStore {
    config: S3StoreConfig,
    client: aws_sdk_s3::Client,
}

impl std::fmt::Debug for S3ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ArtifactStore")
            .field("config", &self.config)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl S3ArtifactStore {
    pub async fn new(config: S3StoreConfig) -> Self {
        let client = build_client(&config).await;
        Self { config, client }
    }

    /// Create an `S3ArtifactStore` with a pre-built client.
    pub fn with_client(config: S3StoreConfig, client: aws_sdk_s3::Client) -> Self {
        Self { config, client }
    }

    /// Write the folder marker object.
    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    pub async fn create_folder(&self, folder: &str) -> Result<(), StoreError> {
        let key = self.config.folder_key(folder);
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&key, &e))?;
        info!(folder, "S3 folder marker created");
        Ok(())
    }

    async fn folder_exists(&self, folder: &str) -> Result<bool, StoreError> {
        let marker = self.config.folder_key(folder);
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(&marker)
            .send()
            .await
        {
            Ok(_) => return Ok(true),
            Err(e) => {
                let err = classify_sdk_error(&marker, &e);
                if !err.is_not_found() {
                    return Err(err);
                }
            }
        }

        let listed = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(&marker)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&marker, &e))?;
        Ok(!listed.contents().is_empty())
    }

    fn artifact_from_key(
        &self,
        key: &str,
        created_at: DateTime<Utc>,
        size: Option<i64>,
    ) -> Option<Artifact> {
        let (folder, name) = self.config.split_key(key)?;
        Some(Artifact {
            id: key.to_owned(),
            name: name.to_owned(),
            created_at,
            folder: folder.to_owned(),
            size_bytes: size.and_then(|s| u64::try_from(s).ok()),
        })
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn ensure_folder(&self, folder: &str) -> Result<(), StoreError> {
        if self.folder_exists(folder).await? {
            Ok(())
        } else {
            Err(StoreError::FolderNotFound(folder.to_owned()))
        }
    }

    #[instrument(skip(self, source), fields(bucket = %self.config.bucket))]
    async fn upload(
        &self,
        folder: &str,
        name: &str,
        source: &Path,
    ) -> Result<Artifact, StoreError> {
        self.ensure_folder(folder).await?;
        let key = self.config.object_key(folder, name);
        let size = tokio::fs::metadata(source).await?.len();
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;

        debug!(key = %key, size, "uploading artifact to S3");
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .content_type("application/sql")
            .body(body)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&key, &e))?;

        // Read back the stored timestamp so listings and uploads agree.
        let artifact = self.metadata(&key).await?;
        info!(key = %key, size, "artifact uploaded to S3");
        Ok(artifact)
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn list(&self, folder: &str, name_prefix: &str) -> Result<Vec<Artifact>, StoreError> {
        self.ensure_folder(folder).await?;
        let prefix = self.config.object_key(folder, name_prefix);
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(&prefix)
            .into_paginator()
            .send();

        let mut artifacts = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&prefix, &e))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let created_at = to_chrono(object.last_modified());
                // The folder marker has an empty name and is skipped here.
                if let Some(artifact) = self.artifact_from_key(key, created_at, object.size())
                    && artifact.folder == folder
                {
                    artifacts.push(artifact);
                }
            }
        }
        sort_newest_first(&mut artifacts);
        debug!(folder, count = artifacts.len(), "listed S3 artifacts");
        Ok(artifacts)
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn metadata(&self, id: &str) -> Result<Artifact, StoreError> {
        let head = self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(id, &e))?;
        self.artifact_from_key(id, to_chrono(head.last_modified()), head.content_length())
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }

    #[instrument(skip(self, dest), fields(bucket = %self.config.bucket))]
    async fn download(&self, id: &str, dest: &Path) -> Result<u64, StoreError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(id, &e))?;

        let mut reader = object.body.into_async_read();
        let mut file = tokio::fs::File::create(dest).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        debug!(id, bytes = written, "artifact downloaded from S3");
        Ok(written)
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        match self
            .client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = classify_sdk_error(id, &e);
                if err.is_not_found() {
                    debug!(id, "delete of absent artifact treated as success");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }
}
