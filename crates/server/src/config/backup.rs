use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use pgvault_core::DEFAULT_ARTIFACT_PREFIX;

/// Dump production settings and the timeouts bounding each operation.
#[derive(Debug, Deserialize)]
pub struct BackupConfig {
    /// Prefix of artifact names (`{prefix}_{tenant}_{YYYYMMDDTHHMMSS}.sql`).
    #[serde(default = "default_prefix")]
    pub artifact_prefix: String,
    /// Path or name of the `pg_dump` binary.
    #[serde(default = "default_dump_binary")]
    pub dump_binary: PathBuf,
    /// Directory for scratch dump and restore files. Defaults to the system
    /// temporary directory.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    /// The dump process is killed after this many seconds.
    #[serde(default = "default_dump_timeout")]
    pub dump_timeout_seconds: u64,
    /// Upper bound of every single storage call.
    #[serde(default = "default_storage_timeout")]
    pub storage_timeout_seconds: u64,
    /// How long a request waits for another operation on the same tenant.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_seconds: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            artifact_prefix: default_prefix(),
            dump_binary: default_dump_binary(),
            work_dir: None,
            dump_timeout_seconds: default_dump_timeout(),
            storage_timeout_seconds: default_storage_timeout(),
            lock_timeout_seconds: default_lock_timeout(),
        }
    }
}

impl BackupConfig {
    pub fn dump_timeout(&self) -> Duration {
        Duration::from_secs(self.dump_timeout_seconds)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_seconds)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_seconds)
    }
}

fn default_prefix() -> String {
    DEFAULT_ARTIFACT_PREFIX.to_owned()
}

fn default_dump_binary() -> PathBuf {
    PathBuf::from("pg_dump")
}

fn default_dump_timeout() -> u64 {
    600
}

fn default_storage_timeout() -> u64 {
    120
}

fn default_lock_timeout() -> u64 {
    30
}
