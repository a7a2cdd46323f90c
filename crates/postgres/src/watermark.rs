use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use pgvault_core::{QualifiedTable, TenantConfig, Watermarks};

use crate::connect::connect;
use crate::error::GateError;

/// Reads and records the export watermarks of a tenant.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Last export and last mutation times from the metadata row.
    async fn read(&self, tenant: &TenantConfig) -> Result<Watermarks, GateError>;

    /// Mark the tenant as exported at `at`.
    async fn record_export(&self, tenant: &TenantConfig, at: DateTime<Utc>)
    -> Result<(), GateError>;
}

/// [`WatermarkStore`] over the tenant's metadata table, one auto-committed
/// connection per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgWatermarks;

pub(crate) fn read_statement(table: &QualifiedTable) -> String {
    format!(
        "SELECT last_data_export::timestamptz, updated_at::timestamptz FROM {} WHERE id = 1",
        table.quoted()
    )
}

/// Both columns move to the export time, so the gate skips until the data
/// changes again.
pub(crate) fn record_statement(table: &QualifiedTable) -> String {
    format!(
        "UPDATE {} SET last_data_export = $1, updated_at = $1 WHERE id = 1",
        table.quoted()
    )
}

#[async_trait]
impl WatermarkStore for PgWatermarks {
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    async fn read(&self, tenant: &TenantConfig) -> Result<Watermarks, GateError> {
        let mut conn = connect(&tenant.connection).await?;
        let row: Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> =
            sqlx::query_as(&read_statement(&tenant.metadata_table))
                .fetch_optional(&mut conn)
                .await
                .map_err(|e| GateError::Query(e.to_string()))?;
        let (last_export, last_mutation) = row.unwrap_or_default();
        debug!(?last_export, ?last_mutation, "read watermarks");
        Ok(Watermarks {
            last_export,
            last_mutation,
        })
    }

    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    async fn record_export(
        &self,
        tenant: &TenantConfig,
        at: DateTime<Utc>,
    ) -> Result<(), GateError> {
        let mut conn = connect(&tenant.connection).await?;
        let result = sqlx::query(&record_statement(&tenant.metadata_table))
            .bind(at)
            .execute(&mut conn)
            .await
            .map_err(|e| GateError::Query(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(GateError::MissingRow(tenant.metadata_table.to_string()));
        }
        debug!(%at, "recorded export watermark");
        Ok(())
    }
}


#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use chrono::TimeDelta;
    use sqlx::Connection;

    use super::*;
    use crate::testing::{drop_schema, live_tenant, setup_schema};

    #[tokio::test]
    async fn gate_round_trip() {
        let (tenant, schema) = live_tenant(&["person"]);
        setup_schema(&tenant, &schema).await;

        let watermarks = PgWatermarks.read(&tenant).await.unwrap();
        assert_eq!(watermarks.last_export, None);
        assert!(!watermarks.decide().is_skip());

        let at = Utc::now() - TimeDelta::seconds(5);
        PgWatermarks.record_export(&tenant, at).await.unwrap();
        let watermarks = PgWatermarks.read(&tenant).await.unwrap();
        assert!(watermarks.decide().is_skip());

        let mut conn = connect(&tenant.connection).await.unwrap();
        sqlx::query(&format!(
            "UPDATE {}.app_config SET updated_at = now() + interval '5 minutes'",
            schema
        ))
        .execute(&mut conn)
        .await
        .unwrap();
        conn.close().await.unwrap();
        assert!(!PgWatermarks.read(&tenant).await.unwrap().decide().is_skip());

        drop_schema(&tenant, &schema).await;
    }
}
