use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tempfile::TempPath;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use pgvault_core::TenantConfig;

use crate::error::DumpError;

/// Text the dump tool prints when client and server major versions differ.
const VERSION_MISMATCH_MARKER: &str = "server version";

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A dump written to a scratch file.
///
/// The file is deleted when the value is dropped, whichever path the caller
/// takes after producing it.
#[derive(Debug)]
pub struct DumpFile {
    path: TempPath,
    size: u64,
}

impl DumpFile {
    pub fn new(path: TempPath, size: u64) -> Self {
        Self { path, size }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the file now, reporting any error.
    pub fn close(self) -> std::io::Result<()> {
        self.path.close()
    }
}

/// Produces data-only dumps of a tenant's table allow-list.
#[async_trait]
pub trait Dumper: Send + Sync {
    async fn dump(&self, tenant: &TenantConfig) -> Result<DumpFile, DumpError>;
}

/// [`Dumper`] that shells out to `pg_dump`.
#[derive(Debug, Clone)]
pub struct PgDumpProducer {
    binary: PathBuf,
    work_dir: Option<PathBuf>,
    timeout: Duration,
}

impl PgDumpProducer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            work_dir: None,
            timeout,
        }
    }

    /// Write scratch files under `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Version string reported by `<binary> --version`, if it can be run.
    pub async fn tool_version(&self) -> Option<String> {
        let probe = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(VERSION_PROBE_TIMEOUT, probe).await {
            Ok(Ok(output)) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_owned())
            }
            Ok(Ok(output)) => {
                warn!(status = %output.status, "dump tool version probe failed");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "could not run dump tool version probe");
                None
            }
            Err(_) => {
                warn!("dump tool version probe timed out");
                None
            }
        }
    }

    fn scratch_path(&self, tenant: &TenantConfig) -> Result<TempPath, DumpError> {
        let prefix = format!("pgvault_{}_", tenant.id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".sql");
        let file = match &self.work_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path())
    }
}

/// Command-line arguments for a data-only plain-text dump of the tenant's
/// tables, written to `output`.
///
/// The password is not part of the arguments; it travels in `PGPASSWORD`.
pub fn dump_args(tenant: &TenantConfig, output: &Path) -> Vec<OsString> {
    let conn = &tenant.connection;
    let port = conn.port.to_string();
    let mut args: Vec<OsString> = [
        "-h",
        conn.host.as_str(),
        "-p",
        port.as_str(),
        "-U",
        conn.user.as_str(),
        "-d",
        conn.database.as_str(),
        "-F",
        "p",
        "--no-owner",
        "--no-acl",
        "--data-only",
        "--verbose",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push("--file".into());
    args.push(output.as_os_str().to_owned());
    for table in tenant.retained_tables() {
        args.push("--table".into());
        args.push(table.quoted().into());
    }
    args
}

#[async_trait]
impl Dumper for PgDumpProducer {
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    async fn dump(&self, tenant: &TenantConfig) -> Result<DumpFile, DumpError> {
        let tool_version = self.tool_version().await;
        info!(
            binary = %self.binary.display(),
            version = tool_version.as_deref().unwrap_or("unknown"),
            "running dump tool"
        );

        let path = self.scratch_path(tenant)?;
        let child = Command::new(&self.binary)
            .args(dump_args(tenant, &path))
            .env("PGPASSWORD", tenant.connection.password.expose_secret())
            .env("PGSSLMODE", tenant.connection.ssl_mode_or_default())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DumpError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        // Dropping the child on timeout kills it.
        let Ok(output) = tokio::time::timeout(self.timeout, child.wait_with_output()).await else {
            error!(timeout_secs = self.timeout.as_secs(), "dump tool timed out");
            return Err(DumpError::Timeout(self.timeout));
        };
        let output = output?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            error!(status = %output.status, stderr = %stderr.trim(), "dump tool failed");
            if stderr.contains(VERSION_MISMATCH_MARKER) || stdout.contains(VERSION_MISMATCH_MARKER)
            {
                return Err(DumpError::VersionMismatch {
                    tool_version: tool_version.unwrap_or_else(|| "unknown".to_owned()),
                    detail: stderr.trim().to_owned(),
                });
            }
            return Err(DumpError::Failed {
                status: output.status.to_string(),
                stderr: stderr.trim().to_owned(),
            });
        }
        debug!(lines = stderr.lines().count(), "dump tool diagnostics");

        let size = tokio::fs::metadata(&path).await?.len();
        info!(bytes = size, "dump finished");
        Ok(DumpFile::new(path, size))
    }
}

#[cfg(test)]
mod tests {
    use pgvault_core::testing::sample_tenant;

    use super::*;

    #[test]
    fn args_cover_the_table_list_without_secrets() {
        let mut tenant = sample_tenant("T", &["inventory.person", "inventory.booking"]);
        tenant.connection.password = secrecy::SecretString::new("s3cret-pw".into());
        let args: Vec<String> = dump_args(&tenant, Path::new("/tmp/out.sql"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.windows(2).any(|w| w == ["--file", "/tmp/out.sql"]));
        assert!(args.contains(&"--data-only".to_owned()));
        assert!(args.contains(&"--no-owner".to_owned()));
        assert!(args.contains(&"--no-acl".to_owned()));
        assert!(args.windows(2).any(|w| w == ["-F", "p"]));
        let tables: Vec<_> = args
            .windows(2)
            .filter(|w| w[0] == "--table")
            .map(|w| w[1].clone())
            .collect();
        assert_eq!(
            tables,
            [
                r#""inventory"."person""#,
                r#""inventory"."booking""#,
                r#""inventory"."app_config""#
            ]
        );
        assert!(!args.iter().any(|a| a.contains("s3cret-pw")));
    }

    #[cfg(unix)]
    mod process {
        use std::os::unix::fs::PermissionsExt;

        use super::*;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake_pg_dump");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        const WRITES_DUMP: &str = r#"
if [ "$1" = "--version" ]; then echo "pg_dump (PostgreSQL) 16.2"; exit 0; fi
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--file" ]; then out="$2"; fi
  shift
done
[ "$PGPASSWORD" = "postgres" ] || exit 3
printf 'COPY inventory.person (id, name) FROM stdin;\n1\tAlice\n\\.\n' > "$out"
echo "pg_dump: dumping contents of table" >&2
"#;

        #[tokio::test]
        async fn successful_dump_is_removed_on_drop() {
            let dir = tempfile::tempdir().unwrap();
            let producer = PgDumpProducer::new(script(dir.path(), WRITES_DUMP), Duration::from_secs(30))
                .with_work_dir(dir.path());
            let tenant = sample_tenant("T", &["inventory.person"]);

            assert_eq!(producer.tool_version().await.as_deref(), Some("pg_dump (PostgreSQL) 16.2"));
            let dump = producer.dump(&tenant).await.unwrap();
            let path = dump.path().to_path_buf();
            assert!(dump.size() > 0);
            let contents = tokio::fs::read_to_string(&path).await.unwrap();
            assert!(contents.starts_with("COPY inventory.person"));

            drop(dump);
            assert!(!path.exists());
        }

        #[tokio::test]
        async fn version_mismatch_is_distinguished() {
            let dir = tempfile::tempdir().unwrap();
            let body = r#"
if [ "$1" = "--version" ]; then echo "pg_dump (PostgreSQL) 14.9"; exit 0; fi
echo "pg_dump: error: aborting because of server version mismatch" >&2
exit 1
"#;
            let producer = PgDumpProducer::new(script(dir.path(), body), Duration::from_secs(30))
                .with_work_dir(dir.path());
            let err = producer
                .dump(&sample_tenant("T", &["inventory.person"]))
                .await
                .unwrap_err();
            match err {
                DumpError::VersionMismatch { tool_version, detail } => {
                    assert_eq!(tool_version, "pg_dump (PostgreSQL) 14.9");
                    assert!(detail.contains("server version mismatch"));
                }
                other => panic!("expected VersionMismatch, got {other:?}"),
            }
            // Only the script remains; the scratch file was removed.
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        }

        #[tokio::test]
        async fn generic_failure_carries_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let body = r#"
if [ "$1" = "--version" ]; then echo "pg_dump (PostgreSQL) 16.2"; exit 0; fi
echo "pg_dump: error: connection refused" >&2
exit 1
"#;
            let producer = PgDumpProducer::new(script(dir.path(), body), Duration::from_secs(30));
            let err = producer
                .dump(&sample_tenant("T", &["inventory.person"]))
                .await
                .unwrap_err();
            assert!(matches!(&err, DumpError::Failed { stderr, .. } if stderr.contains("connection refused")));
        }

        #[tokio::test]
        async fn slow_dump_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let body = r#"
if [ "$1" = "--version" ]; then echo "pg_dump (PostgreSQL) 16.2"; exit 0; fi
sleep 30
"#;
            let producer = PgDumpProducer::new(script(dir.path(), body), Duration::from_millis(300))
                .with_work_dir(dir.path());
            let err = producer
                .dump(&sample_tenant("T", &["inventory.person"]))
                .await
                .unwrap_err();
            assert!(matches!(err, DumpError::Timeout(_)));
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        }

        #[tokio::test]
        async fn missing_binary_is_a_spawn_error() {
            let producer = PgDumpProducer::new("/nonexistent/pg_dump", Duration::from_secs(5));
            assert!(producer.tool_version().await.is_none());
            let err = producer
                .dump(&sample_tenant("T", &["inventory.person"]))
                .await
                .unwrap_err();
            assert!(matches!(err, DumpError::Spawn { .. }));
        }
    }
}
