use sqlx::PgConnection;
use tracing::{debug, warn};

use pgvault_core::{QualifiedTable, quote_ident};

use crate::error::RestoreError;

/// Columns of a table backed by a sequence (serial or identity), with the
/// sequence name.
const OWNED_SEQUENCES: &str = "\
SELECT a.attname::text, pg_get_serial_sequence($1, a.attname) \
FROM pg_attribute a \
WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped \
AND pg_get_serial_sequence($1, a.attname) IS NOT NULL \
ORDER BY a.attnum";

pub(crate) fn setval_statement(table: &QualifiedTable, column: &str) -> String {
    format!(
        "SELECT setval(CAST($1 AS regclass), COALESCE((SELECT MAX({col}) FROM {table}), 0) + 1, false)",
        col = quote_ident(column),
        table = table.quoted()
    )
}

/// Move every sequence owned by `table` past the largest restored value.
///
/// Each sequence is reset under its own savepoint. A failure is logged and
/// skipped; only failing to roll back to the savepoint aborts the restore.
/// Returns the number of sequences realigned.
pub async fn realign(conn: &mut PgConnection, table: &QualifiedTable) -> Result<usize, RestoreError> {
    let sequences: Vec<(String, String)> = sqlx::query_as(OWNED_SEQUENCES)
        .bind(table.quoted())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| RestoreError::transaction("listing sequences", &e))?;

    let mut realigned = 0;
    for (column, sequence) in sequences {
        sqlx::query("SAVEPOINT realign_sequence")
            .execute(&mut *conn)
            .await
            .map_err(|e| RestoreError::transaction("savepoint", &e))?;
        let result = sqlx::query(&setval_statement(table, &column))
            .bind(&sequence)
            .execute(&mut *conn)
            .await;
        match result {
            Ok(_) => {
                sqlx::query("RELEASE SAVEPOINT realign_sequence")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| RestoreError::transaction("release savepoint", &e))?;
                debug!(%table, column = %column, sequence = %sequence, "sequence realigned");
                realigned += 1;
            }
            Err(e) => {
                warn!(%table, column = %column, sequence = %sequence, error = %e, "could not realign sequence");
                sqlx::query("ROLLBACK TO SAVEPOINT realign_sequence")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| RestoreError::transaction("rollback to savepoint", &e))?;
            }
        }
    }
    Ok(realigned)
}
