use std::collections::HashMap;
use std::sync::Arc;

use pgvault_core::{
    ConnectionSettings, QualifiedTable, TenantConfig, TenantFolders, TenantId,
};
use tracing::info;

use crate::config::TenantEntry;
use crate::error::ServerError;

/// The validated, immutable set of tenants, built once at startup.
#[derive(Debug, Default)]
pub struct TenantRegistry {
    order: Vec<Arc<TenantConfig>>,
    by_id: HashMap<TenantId, Arc<TenantConfig>>,
}

impl TenantRegistry {
    /// Build a registry from already validated tenants. Duplicate ids are
    /// rejected.
    pub fn new(tenants: Vec<TenantConfig>) -> Result<Self, ServerError> {
        let mut registry = Self::default();
        for tenant in tenants {
            let tenant = Arc::new(tenant);
            if registry
                .by_id
                .insert(tenant.id.clone(), Arc::clone(&tenant))
                .is_some()
            {
                return Err(ServerError::Config(format!("duplicate tenant id: {}", tenant.id)));
            }
            registry.order.push(tenant);
        }
        Ok(registry)
    }

    /// Validate the `[[tenants]]` entries of the configuration file.
    pub fn from_entries(entries: &[TenantEntry]) -> Result<Self, ServerError> {
        let tenants = entries
            .iter()
            .map(tenant_from_entry)
            .collect::<Result<Vec<_>, _>>()?;
        let registry = Self::new(tenants)?;
        info!(tenants = registry.len(), "tenant registry loaded");
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<Arc<TenantConfig>> {
        let id = TenantId::new(id).ok()?;
        self.by_id.get(&id).cloned()
    }

    /// Tenants in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TenantConfig>> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn tenant_from_entry(entry: &TenantEntry) -> Result<TenantConfig, ServerError> {
    let invalid = |e: pgvault_core::CoreError| ServerError::Config(format!("tenant {}: {e}", entry.id));

    let id = TenantId::new(entry.id.clone()).map_err(invalid)?;
    if entry.tables.is_empty() {
        return Err(ServerError::Config(format!("tenant {id}: tables must not be empty")));
    }
    let tables = entry
        .tables
        .iter()
        .map(|t| QualifiedTable::parse(t))
        .collect::<Result<Vec<_>, _>>()
        .map_err(invalid)?;
    let metadata_table = QualifiedTable::parse(&entry.metadata_table).map_err(invalid)?;

    Ok(TenantConfig {
        name: entry.name.clone().unwrap_or_else(|| id.to_string()),
        connection: ConnectionSettings {
            host: entry.host.clone(),
            port: entry.port,
            user: entry.user.clone(),
            password: entry.password()?,
            database: entry.database.clone(),
            ssl_mode: entry.ssl_mode.clone(),
        },
        audience: entry.audience.clone(),
        tables,
        metadata_table,
        version_offset: entry.version_offset,
        folders: TenantFolders {
            backup: entry.folders.backup.clone(),
            inventory: entry.folders.inventory.clone(),
        },
        id,
    })
}
