use sqlx::PgConnection;

use pgvault_core::QualifiedTable;

use crate::error::RestoreError;

/// A column of a live table, with its type as rendered by `format_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    pub data_type: String,
}

impl LiveColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Insertable columns of `table` in declaration order. Generated columns
/// are left out since they cannot be written.
const LIVE_COLUMNS: &str = "\
SELECT a.attname::text, format_type(a.atttypid, a.atttypmod) \
FROM pg_attribute a \
WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped \
AND a.attgenerated = '' \
ORDER BY a.attnum";

/// Read the live columns of `table`.
///
/// Returns [`RestoreError::MissingTable`] when the table does not exist.
pub async fn live_columns(
    conn: &mut PgConnection,
    table: &QualifiedTable,
) -> Result<Vec<LiveColumn>, RestoreError> {
    let rows: Vec<(String, String)> = sqlx::query_as(LIVE_COLUMNS)
        .bind(table.quoted())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| RestoreError::transaction("reading live columns", &e))?;
    if rows.is_empty() {
        return Err(RestoreError::MissingTable(table.to_string()));
    }
    Ok(rows
        .into_iter()
        .map(|(name, data_type)| LiveColumn { name, data_type })
        .collect())
}
