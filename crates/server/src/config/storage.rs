use serde::Deserialize;

/// Remote artifact storage backend.
///
/// # Example
///
/// ```toml
/// [storage]
/// backend = "s3"
/// bucket = "pgvault-backups"
/// region = "eu-west-3"
/// key_prefix = "prod/"
/// ```
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// `"memory"` (local development, lost on exit) or `"s3"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Bucket name. Required by the `s3` backend.
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Endpoint of an S3-compatible service (`MinIO`, `LocalStack`).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Prefix prepended to every object key.
    #[serde(default)]
    pub key_prefix: String,
    /// Path-style addressing, needed by most S3-compatible services.
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: None,
            region: default_region(),
            endpoint_url: None,
            key_prefix: String::new(),
            force_path_style: false,
        }
    }
}

fn default_backend() -> String {
    "memory".to_owned()
}

fn default_region() -> String {
    "us-east-1".to_owned()
}
