use secrecy::SecretString;

use crate::table::QualifiedTable;
use crate::tenant::{ConnectionSettings, TenantConfig, TenantFolders, TenantId};

/// Build a tenant with the given table list for use in tests.
///
/// The connection points at `localhost:5432` with SSL disabled and the
/// backup folder is `"{id}-backups"`. Panics on invalid input.
pub fn sample_tenant(id: &str, tables: &[&str]) -> TenantConfig {
    let tables: Vec<QualifiedTable> = tables
        .iter()
        .map(|t| QualifiedTable::parse(t).expect("valid table name"))
        .collect();
    TenantConfig {
        id: TenantId::new(id).expect("valid tenant id"),
        name: format!("{id} (test)"),
        connection: ConnectionSettings {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: SecretString::new("postgres".into()),
            database: "postgres".into(),
            ssl_mode: Some("disable".into()),
        },
        audience: "authenticated".into(),
        tables,
        metadata_table: QualifiedTable::parse("inventory.app_config")
            .expect("valid table name"),
        version_offset: 5,
        folders: TenantFolders {
            backup: Some(format!("{id}-backups")),
            inventory: None,
        },
    }
}
