#![allow(dead_code)]

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use secrecy::SecretString;

use pgvault_core::testing::sample_tenant;
use pgvault_core::{
    ArtifactNaming, ParsedDump, RestoreMode, RestoreProgress, RestoreReport, RestoreState,
    SchemaVersions, TableReport, TenantConfig, VersionSnapshot, Watermarks, select_mode,
};
use pgvault_dump::{DumpError, DumpFile, Dumper};
use pgvault_postgres::{GateError, RestoreEngine, RestoreError, WatermarkStore};
use pgvault_retention::Rotator;
use pgvault_server::api::AppState;
use pgvault_server::auth::{AppMetadata, Claims, JwtVerifier, Role};
use pgvault_server::lock::TenantLocks;
use pgvault_server::registry::TenantRegistry;
use pgvault_server::service::{BackupService, RestoreService};
use pgvault_store::ArtifactStore;
use pgvault_store_memory::MemoryArtifactStore;

pub const SECRET: &str = "test-secret";
pub const TENANT: &str = "acme";
pub const FOLDER: &str = "acme-backups";

/// Item rows plus a metadata row carrying schema version 4.
pub const DUMP: &str = "\
COPY inventory.item (id, name) FROM stdin;
1\tbolt
2\tnut
\\.

COPY inventory.app_config (id, name, app_version, schema_version) FROM stdin;
1\tdemo\t1.2.0\t4
\\.
";

// -- Fake dump producer ---------------------------------------------------

pub struct FakeDumper {
    content: String,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeDumper {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_owned(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dumper for FakeDumper {
    async fn dump(&self, _tenant: &TenantConfig) -> Result<DumpFile, DumpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DumpError::Failed {
                status: "exit status: 1".into(),
                stderr: "pg_dump: error: connection refused".into(),
            });
        }
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(self.content.as_bytes())?;
        Ok(DumpFile::new(
            file.into_temp_path(),
            self.content.len() as u64,
        ))
    }
}

// -- Fake watermark store -------------------------------------------------

/// `None` makes every read fail.
pub struct FakeWatermarks {
    watermarks: Option<Watermarks>,
    recorded: Mutex<Vec<DateTime<Utc>>>,
}

impl FakeWatermarks {
    pub fn new(watermarks: Option<Watermarks>) -> Self {
        Self {
            watermarks,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<DateTime<Utc>> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl WatermarkStore for FakeWatermarks {
    async fn read(&self, _tenant: &TenantConfig) -> Result<Watermarks, GateError> {
        self.watermarks
            .ok_or_else(|| GateError::Query("relation does not exist".into()))
    }

    async fn record_export(
        &self,
        _tenant: &TenantConfig,
        at: DateTime<Utc>,
    ) -> Result<(), GateError> {
        self.recorded.lock().unwrap().push(at);
        Ok(())
    }
}

// -- Fake restore engine --------------------------------------------------

/// Walks the restore state machine and counts rows instead of touching a
/// database. `current` is the live schema version.
pub struct FakeEngine {
    current: Option<String>,
}

impl FakeEngine {
    pub fn new(current: Option<&str>) -> Self {
        Self {
            current: current.map(str::to_owned),
        }
    }
}

#[async_trait]
impl RestoreEngine for FakeEngine {
    async fn restore(
        &self,
        tenant: &TenantConfig,
        dump: &ParsedDump,
        backup: &VersionSnapshot,
        strict: bool,
        progress: &mut RestoreProgress,
    ) -> Result<RestoreReport, RestoreError> {
        let mode: RestoreMode = select_mode(
            strict,
            backup.schema_version.as_deref(),
            self.current.as_deref(),
        )?;
        progress.advance(RestoreState::ModeSelected(mode))?;
        progress.advance(RestoreState::Truncated)?;

        let mut tables = Vec::new();
        for (i, table) in tenant.restore_order().enumerate() {
            progress.advance(RestoreState::Restoring(i))?;
            tables.push(TableReport {
                table: table.to_string(),
                inserted: dump.block(table).map_or(0, |b| b.rows.len() as u64),
                skipped: 0,
                ignored_columns: Vec::new(),
            });
        }
        progress.advance(RestoreState::SequencesRealigned)?;
        progress.advance(RestoreState::VersionsRestored)?;
        progress.advance(RestoreState::Committed)?;

        Ok(RestoreReport {
            mode,
            schema: SchemaVersions {
                current: self.current.clone(),
                backup: backup.schema_version.clone(),
            },
            tables,
        })
    }
}

// -- Harness --------------------------------------------------------------

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryArtifactStore>,
    pub dumper: Arc<FakeDumper>,
    pub watermarks: Arc<FakeWatermarks>,
    pub locks: Arc<TenantLocks>,
}

pub struct HarnessBuilder {
    dumper: FakeDumper,
    watermarks: Option<Watermarks>,
    current_schema: Option<String>,
    auth: bool,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            dumper: FakeDumper::new(DUMP),
            watermarks: Some(Watermarks::default()),
            current_schema: Some("4".into()),
            auth: true,
        }
    }
}

impl HarnessBuilder {
    pub fn dumper(mut self, dumper: FakeDumper) -> Self {
        self.dumper = dumper;
        self
    }

    pub fn watermarks(mut self, watermarks: Option<Watermarks>) -> Self {
        self.watermarks = watermarks;
        self
    }

    pub fn current_schema(mut self, version: Option<&str>) -> Self {
        self.current_schema = version.map(str::to_owned);
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.auth = false;
        self
    }

    /// Two tenants, `acme` and `beta`. Only `acme` has its backup folder
    /// in the store.
    pub fn build(self) -> Harness {
        let registry = TenantRegistry::new(vec![
            sample_tenant(TENANT, &["inventory.item"]),
            sample_tenant("beta", &["inventory.item"]),
        ])
        .unwrap();

        let store = Arc::new(MemoryArtifactStore::new());
        store.create_folder(FOLDER);
        let dyn_store: Arc<dyn ArtifactStore> = store.clone();

        let naming = ArtifactNaming::default();
        let locks = Arc::new(TenantLocks::new(Duration::from_millis(50)));
        let dumper = Arc::new(self.dumper);
        let watermarks = Arc::new(FakeWatermarks::new(self.watermarks));

        let backups = BackupService::new(
            Arc::clone(&dyn_store),
            dumper.clone(),
            watermarks.clone(),
            naming.clone(),
            Arc::clone(&locks),
        )
        .with_rotator(Rotator::new(Arc::clone(&dyn_store), naming));
        let restores = RestoreService::new(
            dyn_store,
            Arc::new(FakeEngine {
                current: self.current_schema,
            }),
            Arc::clone(&locks),
        );

        let auth = self.auth.then(|| {
            Arc::new(JwtVerifier::new(
                &SecretString::new(SECRET.into()),
                vec![Role::Admin, Role::Dev],
                0,
            ))
        });

        Harness {
            state: AppState {
                registry: Arc::new(registry),
                backups: Arc::new(backups),
                restores: Arc::new(restores),
                auth,
            },
            store,
            dumper,
            watermarks,
            locks,
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::default().build()
}

/// HS256 token for the `authenticated` audience, expiring `exp_offset`
/// seconds from now.
pub fn token_with(role: Option<&str>, audience: &str, exp_offset: i64) -> String {
    let claims = Claims {
        sub: Some("user-1".into()),
        aud: Some(audience.into()),
        exp: jsonwebtoken::get_current_timestamp().saturating_add_signed(exp_offset),
        app_metadata: AppMetadata {
            role: role.map(str::to_owned),
        },
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn admin_token() -> String {
    token_with(Some("admin"), "authenticated", 600)
}
