use sqlx::PgConnection;
use tracing::{debug, warn};

use pgvault_core::{QualifiedTable, VersionSnapshot};

use crate::catalog::live_columns;
use crate::error::RestoreError;

pub(crate) fn read_statement(table: &QualifiedTable) -> String {
    format!(
        "SELECT schema_version::text, app_version::text FROM {} LIMIT 1",
        table.quoted()
    )
}

/// Current schema and app version of the live database.
///
/// An empty metadata table yields an unknown snapshot.
pub async fn read_current(
    conn: &mut PgConnection,
    table: &QualifiedTable,
) -> Result<VersionSnapshot, RestoreError> {
    let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(&read_statement(table))
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| RestoreError::transaction("reading current versions", &e))?;
    let (schema_version, app_version) = row.unwrap_or_default();
    Ok(VersionSnapshot {
        schema_version,
        app_version,
    })
}

/// Write `snapshot` back into the metadata table, casting to the live
/// column types.
pub async fn write_back(
    conn: &mut PgConnection,
    table: &QualifiedTable,
    snapshot: &VersionSnapshot,
) -> Result<(), RestoreError> {
    let columns = live_columns(conn, table).await?;
    let type_of = |name: &str| {
        columns
            .iter()
            .find(|c| c.name == name)
            .map_or("text", |c| c.data_type.as_str())
    };
    let statement = format!(
        "UPDATE {} SET schema_version = CAST($1::text AS {}), app_version = CAST($2::text AS {})",
        table.quoted(),
        type_of("schema_version"),
        type_of("app_version"),
    );
    let result = sqlx::query(&statement)
        .bind(snapshot.schema_version.as_deref())
        .bind(snapshot.app_version.as_deref())
        .execute(&mut *conn)
        .await
        .map_err(|e| RestoreError::transaction("restoring versions", &e))?;
    if result.rows_affected() == 0 {
        warn!(%table, "no metadata row to restore versions into");
    } else {
        debug!(
            %table,
            schema_version = snapshot.schema_version.as_deref().unwrap_or("unknown"),
            "versions restored"
        );
    }
    Ok(())
}
