use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the S3 artifact store.
///
/// Tenant folders map to key prefixes inside a single bucket:
/// `{key_prefix}{folder}/{artifact name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3StoreConfig {
    pub bucket: String,

    /// AWS region (e.g. `"us-east-1"`).
    pub region: String,

    /// Endpoint override for S3-compatible services (`MinIO`, `LocalStack`).
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Prefix prepended to every key (e.g. `"pgvault/"`).
    #[serde(default)]
    pub key_prefix: String,

    /// Use path-style addressing, required by most S3-compatible services.
    #[serde(default)]
    pub force_path_style: bool,
}

impl S3StoreConfig {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint_url: None,
            key_prefix: String::new(),
            force_path_style: false,
        }
    }

    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    #[must_use]
    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    #[must_use]
    pub fn with_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    /// Key of the marker object that makes a folder exist (`{prefix}{folder}/`).
    pub(crate) fn folder_key(&self, folder: &str) -> String {
        format!("{}{folder}/", self.key_prefix)
    }

    pub(crate) fn object_key(&self, folder: &str, name: &str) -> String {
        format!("{}{name}", self.folder_key(folder))
    }

    /// Split an object key back into `(folder, name)`.
    pub(crate) fn split_key<'a>(&self, key: &'a str) -> Option<(&'a str, &'a str)> {
        key.strip_prefix(self.key_prefix.as_str())?
            .rsplit_once('/')
            .filter(|(folder, name)| !folder.is_empty() && !name.is_empty())
    }
}

/// Build an S3 client using the standard AWS credential chain.
pub async fn build_client(config: &S3StoreConfig) -> aws_sdk_s3::Client {
    let mut loader = aws_config::from_env().region(aws_config::Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint_url {
        debug!(endpoint = %endpoint, "using custom S3 endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.force_path_style)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
