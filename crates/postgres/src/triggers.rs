use sqlx::PgConnection;
use tracing::debug;

use pgvault_core::QualifiedTable;

use crate::error::RestoreError;

pub(crate) fn disable_statement(table: &QualifiedTable) -> String {
    format!("ALTER TABLE {} DISABLE TRIGGER USER", table.quoted())
}

pub(crate) fn enable_statement(table: &QualifiedTable) -> String {
    format!("ALTER TABLE {} ENABLE TRIGGER USER", table.quoted())
}

/// Suspend the user triggers of `table`. System triggers, including the
/// ones enforcing foreign keys, stay active.
pub async fn suspend(conn: &mut PgConnection, table: &QualifiedTable) -> Result<(), RestoreError> {
    sqlx::query(&disable_statement(table))
        .execute(&mut *conn)
        .await
        .map_err(|e| RestoreError::transaction("suspending triggers", &e))?;
    debug!(%table, "user triggers suspended");
    Ok(())
}

pub async fn resume(conn: &mut PgConnection, table: &QualifiedTable) -> Result<(), RestoreError> {
    sqlx::query(&enable_statement(table))
        .execute(&mut *conn)
        .await
        .map_err(|e| RestoreError::transaction("resuming triggers", &e))?;
    debug!(%table, "user triggers resumed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements() {
        let table = QualifiedTable::parse("inventory.booking").unwrap();
        assert_eq!(
            disable_statement(&table),
            r#"ALTER TABLE "inventory"."booking" DISABLE TRIGGER USER"#
        );
        assert_eq!(
            enable_statement(&table),
            r#"ALTER TABLE "inventory"."booking" ENABLE TRIGGER USER"#
        );
    }
}
