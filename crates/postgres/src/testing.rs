//! Live-database fixtures for the integration tests.
//!
//! Connection settings come from the usual libpq variables (`PGHOST`,
//! `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE`). Every test works in a
//! throwaway schema.

use secrecy::SecretString;
use sqlx::Connection;

use pgvault_core::testing::sample_tenant;
use pgvault_core::{QualifiedTable, TenantConfig};

use crate::connect::connect;

/// Tenant whose tables live in a fresh schema, plus that schema's name.
pub fn live_tenant(tables: &[&str]) -> (TenantConfig, String) {
    let schema = format!("pgvault_it_{}", uuid::Uuid::new_v4().simple());
    let qualified: Vec<String> = tables.iter().map(|t| format!("{schema}.{t}")).collect();
    let refs: Vec<&str> = qualified.iter().map(String::as_str).collect();
    let mut tenant = sample_tenant("it", &refs);
    tenant.metadata_table = QualifiedTable::from_parts(&schema, "app_config").unwrap();

    let conn = &mut tenant.connection;
    if let Ok(host) = std::env::var("PGHOST") {
        conn.host = host;
    }
    if let Some(port) = std::env::var("PGPORT").ok().and_then(|p| p.parse().ok()) {
        conn.port = port;
    }
    if let Ok(user) = std::env::var("PGUSER") {
        conn.user = user;
    }
    if let Ok(password) = std::env::var("PGPASSWORD") {
        conn.password = SecretString::new(password);
    }
    if let Ok(database) = std::env::var("PGDATABASE") {
        conn.database = database;
    }
    (tenant, schema)
}

/// Create the fixture tables: a metadata row at schema version 4, a
/// `person` table holding one old row, a `booking` child table, and an
/// audit trigger on `person`.
pub async fn setup_schema(tenant: &TenantConfig, schema: &str) {
    let mut conn = connect(&tenant.connection).await.unwrap();
    sqlx::raw_sql(&format!(
        "CREATE SCHEMA {schema};
         CREATE TABLE {schema}.app_config (
             id integer PRIMARY KEY,
             app_version text,
             schema_version integer,
             last_data_export timestamptz,
             updated_at timestamptz
         );
         INSERT INTO {schema}.app_config VALUES (1, '2.0.0', 4, NULL, NULL);
         CREATE TABLE {schema}.person (
             id serial PRIMARY KEY,
             name text NOT NULL,
             nickname text,
             email text
         );
         CREATE TABLE {schema}.booking (
             id serial PRIMARY KEY,
             person_id integer NOT NULL REFERENCES {schema}.person (id),
             note text
         );
         INSERT INTO {schema}.person (id, name) VALUES (99, 'Old');
         CREATE TABLE {schema}.audit_log (entry text);
         CREATE FUNCTION {schema}.audit_person() RETURNS trigger LANGUAGE plpgsql AS $$
         BEGIN
             INSERT INTO {schema}.audit_log VALUES (NEW.name);
             RETURN NEW;
         END $$;
         CREATE TRIGGER person_audit AFTER INSERT ON {schema}.person
             FOR EACH ROW EXECUTE FUNCTION {schema}.audit_person();"
    ))
    .execute(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();
}

pub async fn drop_schema(tenant: &TenantConfig, schema: &str) {
    let mut conn = connect(&tenant.connection).await.unwrap();
    sqlx::raw_sql(&format!("DROP SCHEMA {schema} CASCADE"))
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
}
