use std::future::IntoFuture;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pgvault_core::{ArtifactNaming, FolderKind, TenantConfig};
use pgvault_dump::PgDumpProducer;
use pgvault_postgres::{PgAdvisoryLeases, PgRestoreEngine, PgWatermarks};
use pgvault_retention::Rotator;
use pgvault_store::ArtifactStore;
use pgvault_server::api::AppState;
use pgvault_server::auth::JwtVerifier;
use pgvault_server::config::PgvaultConfig;
use pgvault_server::error::{ApiError, ServerError};
use pgvault_server::lock::TenantLocks;
use pgvault_server::registry::TenantRegistry;
use pgvault_server::scheduler::BackupScheduler;
use pgvault_server::service::{BackupOutcome, BackupService, RestoreService};
use pgvault_server::store_factory::create_store;
use pgvault_server::shutdown::{Drain, drain};
use pgvault_server::telemetry;

/// pgvault backup server.
#[derive(Parser, Debug)]
#[command(
    name = "pgvault-server",
    about = "Back up, rotate and restore PostgreSQL tenant databases"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "pgvault.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Back up one tenant (subject to the change gate), then exit.
    Backup {
        #[arg(long)]
        tenant: String,
    },
    /// Apply the retention schedule to one tenant's backup folder, then exit.
    Rotate {
        #[arg(long)]
        tenant: String,
        /// Report what would be deleted without deleting it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print one tenant's backups, newest first, then exit.
    List {
        #[arg(long)]
        tenant: String,
    },
}

/// Long-lived components shared by the server and the one-shot commands.
struct Components {
    registry: Arc<TenantRegistry>,
    store: Arc<dyn ArtifactStore>,
    naming: ArtifactNaming,
    backups: Arc<BackupService>,
    restores: Arc<RestoreService>,
}

fn rotator(
    config: &PgvaultConfig,
    store: &Arc<dyn ArtifactStore>,
    naming: &ArtifactNaming,
    dry_run: bool,
) -> Result<Rotator, ServerError> {
    Ok(Rotator::new(Arc::clone(store), naming.clone())
        .with_timezone(config.retention.tz()?)
        .with_dry_run(dry_run))
}

async fn build(config: &PgvaultConfig) -> Result<Components, ServerError> {
    let registry = Arc::new(TenantRegistry::from_entries(&config.tenants)?);
    if registry.is_empty() {
        warn!("no tenants configured");
    }
    let store = create_store(&config.storage, &registry, config.backup.storage_timeout()).await?;
    let naming = ArtifactNaming::new(config.backup.artifact_prefix.clone());
    let locks = Arc::new(
        TenantLocks::new(config.backup.lock_timeout()).with_leases(Arc::new(PgAdvisoryLeases)),
    );

    let mut dumper = PgDumpProducer::new(&config.backup.dump_binary, config.backup.dump_timeout());
    if let Some(dir) = &config.backup.work_dir {
        dumper = dumper.with_work_dir(dir);
    }

    let mut backups = BackupService::new(
        Arc::clone(&store),
        Arc::new(dumper),
        Arc::new(PgWatermarks),
        naming.clone(),
        Arc::clone(&locks),
    );
    if config.retention.enabled {
        backups = backups.with_rotator(rotator(config, &store, &naming, config.retention.dry_run)?);
    } else {
        info!("retention disabled, backups are never rotated");
    }

    let mut restores = RestoreService::new(Arc::clone(&store), Arc::new(PgRestoreEngine), locks);
    if let Some(dir) = &config.backup.work_dir {
        restores = restores.with_work_dir(dir.clone());
    }

    Ok(Components {
        registry,
        store,
        naming,
        backups: Arc::new(backups),
        restores: Arc::new(restores),
    })
}

fn find_tenant(components: &Components, id: &str) -> Result<Arc<TenantConfig>, ServerError> {
    components
        .registry
        .get(id)
        .ok_or_else(|| ApiError::UnknownTenant(id.to_owned()).into())
}

async fn run_command(
    command: Commands,
    config: &PgvaultConfig,
    components: &Components,
) -> Result<(), ServerError> {
    match command {
        Commands::Backup { tenant: id } => {
            let tenant = find_tenant(components, &id)?;
            match components.backups.backup(&tenant).await? {
                BackupOutcome::Uploaded { artifact, rotation } => {
                    println!("uploaded {} ({})", artifact.name, artifact.id);
                    if let Some(report) = rotation {
                        println!("rotated: kept {}, deleted {}", report.kept, report.deleted.len());
                    }
                }
                BackupOutcome::Skipped { last_export, .. } => {
                    println!("skipped: already up-to-date (last export {last_export})");
                }
            }
        }
        Commands::Rotate { tenant: id, dry_run } => {
            let tenant = find_tenant(components, &id)?;
            let folder = tenant.folder(FolderKind::Backup).map_err(ApiError::from)?;
            let rotator = rotator(config, &components.store, &components.naming, dry_run)?;
            let report = rotator
                .rotate(&tenant.id, folder, Utc::now())
                .await
                .map_err(ApiError::from)?;
            let rendered = serde_json::to_string_pretty(&report)
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            println!("{rendered}");
        }
        Commands::List { tenant: id } => {
            let tenant = find_tenant(components, &id)?;
            for artifact in components.backups.list(&tenant).await? {
                println!(
                    "{}\t{}\t{}",
                    artifact.created_at.to_rfc3339(),
                    artifact.id,
                    artifact.name
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = PgvaultConfig::load(Path::new(&cli.config))?;
    let telemetry_guard = telemetry::init(&config.telemetry);
    let components = build(&config).await?;

    if let Some(command) = cli.command {
        let result = run_command(command, &config, &components).await;
        telemetry_guard.shutdown();
        return Ok(result?);
    }

    let auth = if config.auth.enabled {
        let verifier = JwtVerifier::new(
            &config.auth.secret()?,
            config.auth.allowed_roles.clone(),
            config.auth.leeway_seconds,
        );
        Some(Arc::new(verifier))
    } else {
        warn!("auth disabled, every request runs as admin");
        None
    };

    let shutdown = CancellationToken::new();
    let scheduler = config.scheduler.enabled.then(|| {
        BackupScheduler::new(
            Arc::clone(&components.registry),
            Arc::clone(&components.backups),
            config.scheduler.interval(),
        )
        .spawn(shutdown.clone())
    });

    let state = AppState {
        registry: Arc::clone(&components.registry),
        backups: Arc::clone(&components.backups),
        restores: Arc::clone(&components.restores),
        auth,
    };
    let app = pgvault_server::api::router(state);

    // CLI overrides take precedence.
    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, tenants = components.registry.len(), "pgvault-server listening");

    let timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    let signal_token = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        });

    // A restore still running after the timeout is dropped and its
    // transaction rolls back.
    if drain(server.into_future(), &shutdown, timeout).await? == Drain::TimedOut {
        warn!(
            timeout_secs = config.server.shutdown_timeout_seconds,
            "shutdown timeout exceeded, abandoning in-flight requests"
        );
    }
    shutdown.cancel();

    // A scheduled sweep in progress is allowed to finish within the timeout.
    if let Some(handle) = scheduler {
        if tokio::time::timeout(timeout, handle).await.is_err() {
            warn!(
                timeout_secs = config.server.shutdown_timeout_seconds,
                "shutdown timeout exceeded, abandoning scheduled backup"
            );
        }
    }

    telemetry_guard.shutdown();
    info!("pgvault-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
