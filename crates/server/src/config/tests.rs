use secrecy::ExposeSecret;

use super::*;
use crate::auth::Role;

#[test]
fn empty_file_uses_defaults() {
    let config = PgvaultConfig::parse("").unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.shutdown_timeout_seconds, 30);
    assert!(config.auth.enabled);
    assert_eq!(config.auth.jwt_secret_env, "JWT_SECRET");
    assert_eq!(config.auth.allowed_roles, [Role::Admin, Role::Dev]);
    assert_eq!(config.backup.artifact_prefix, "backup");
    assert_eq!(config.backup.dump_binary.to_str(), Some("pg_dump"));
    assert_eq!(config.backup.lock_timeout_seconds, 30);
    assert_eq!(config.storage.backend, "memory");
    assert!(config.retention.enabled);
    assert_eq!(config.retention.timezone, "UTC");
    assert!(!config.scheduler.enabled);
    assert!(config.tenants.is_empty());
}

#[test]
fn missing_file_uses_defaults() {
    let config = PgvaultConfig::load(Path::new("/nonexistent/pgvault.toml")).unwrap();
    assert_eq!(config.server.port, 8080);
}

#[test]
fn full_file() {
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9090

        [auth]
        jwt_secret = "s3cret"
        allowed_roles = ["admin"]

        [backup]
        artifact_prefix = "nightly"
        dump_binary = "/usr/lib/postgresql/16/bin/pg_dump"
        work_dir = "/var/tmp/pgvault"
        dump_timeout_seconds = 60

        [storage]
        backend = "s3"
        bucket = "backups"
        region = "eu-west-3"
        endpoint_url = "http://minio:9000"
        force_path_style = true

        [retention]
        timezone = "Europe/Paris"

        [scheduler]
        enabled = true
        interval_seconds = 3600

        [[tenants]]
        id = "ACME"
        host = "db.acme.internal"
        user = "acme"
        password = "pw"
        database = "acme"
        tables = ["inventory.app_config", "inventory.person"]

        [tenants.folders]
        backup = "acme-backups"
    "#;

    let config = PgvaultConfig::parse(toml).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.auth.secret().unwrap().expose_secret(), "s3cret");
    assert_eq!(config.auth.allowed_roles, [Role::Admin]);
    assert_eq!(config.backup.artifact_prefix, "nightly");
    assert_eq!(config.backup.dump_timeout().as_secs(), 60);
    assert_eq!(config.backup.storage_timeout().as_secs(), 120);
    assert_eq!(config.storage.bucket.as_deref(), Some("backups"));
    assert!(config.storage.force_path_style);
    assert_eq!(config.retention.tz().unwrap(), chrono_tz::Europe::Paris);
    assert_eq!(config.scheduler.interval().as_secs(), 3600);

    let tenant = &config.tenants[0];
    assert_eq!(tenant.id, "ACME");
    assert_eq!(tenant.port, 5432);
    assert_eq!(tenant.audience, "authenticated");
    assert_eq!(tenant.metadata_table, "inventory.app_config");
    assert_eq!(tenant.version_offset, 5);
    assert_eq!(tenant.folders.backup.as_deref(), Some("acme-backups"));
    assert_eq!(tenant.password().unwrap().expose_secret(), "pw");
}

#[test]
fn unknown_timezone_is_rejected() {
    let config = PgvaultConfig::parse("[retention]\ntimezone = \"Mars/Olympus\"").unwrap();
    assert!(config.retention.tz().is_err());
}

#[test]
fn unknown_role_is_rejected() {
    assert!(PgvaultConfig::parse("[auth]\nallowed_roles = [\"root\"]").is_err());
}

#[test]
fn tenant_without_password_source_fails_to_resolve() {
    let toml = r#"
        [[tenants]]
        id = "T"
        host = "localhost"
        user = "app"
        database = "app"
        tables = ["public.t"]
    "#;
    let config = PgvaultConfig::parse(toml).unwrap();
    assert!(config.tenants[0].password().is_err());
}

#[test]
fn secret_debug_is_redacted() {
    let config = PgvaultConfig::parse("[auth]\njwt_secret = \"do-not-log\"").unwrap();
    assert!(!format!("{config:?}").contains("do-not-log"));
}

#[test]
fn telemetry_defaults() {
    let config: TelemetryConfig = toml::from_str("").unwrap();
    assert!(!config.enabled);
    assert_eq!(config.endpoint, "http://localhost:4317");
    assert_eq!(config.service_name, "pgvault");
    assert!((config.sample_ratio - 1.0).abs() < f64::EPSILON);
    assert_eq!(config.protocol, OtlpProtocol::Grpc);
    assert_eq!(config.export_timeout(), std::time::Duration::from_secs(10));
    assert!(config.resource_attributes.is_empty());
}

#[test]
fn telemetry_custom_config() {
    let toml = r#"
        enabled = true
        endpoint = "http://collector:4318"
        sample_ratio = 0.25
        protocol = "http"

        [resource_attributes]
        "deployment.environment" = "staging"
    "#;

    let config: TelemetryConfig = toml::from_str(toml).unwrap();
    assert!(config.enabled);
    assert_eq!(config.endpoint, "http://collector:4318");
    assert_eq!(config.service_name, "pgvault");
    assert!((config.sample_ratio - 0.25).abs() < f64::EPSILON);
    assert_eq!(config.protocol, OtlpProtocol::Http);
    assert_eq!(config.protocol.to_string(), "http");
    assert_eq!(
        config
            .resource_attributes
            .get("deployment.environment")
            .unwrap(),
        "staging"
    );
}

#[test]
fn telemetry_rejects_unknown_protocol() {
    let err = toml::from_str::<TelemetryConfig>(r#"protocol = "zipkin""#).unwrap_err();
    assert!(err.to_string().contains("zipkin"));
}
