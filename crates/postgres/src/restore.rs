use async_trait::async_trait;
use sqlx::{Connection, PgConnection};
use tracing::{error, info, instrument, warn};

use pgvault_core::{
    CopyBlock, ParsedDump, QualifiedTable, RestoreProgress, RestoreReport, RestoreState,
    SchemaVersions, TableReport, TenantConfig, VersionSnapshot, select_mode,
};

use crate::catalog::live_columns;
use crate::connect::connect;
use crate::error::RestoreError;
use crate::plan::InsertPlan;
use crate::{sequences, triggers, versions};

/// Replays a parsed dump into a tenant's live database.
#[async_trait]
pub trait RestoreEngine: Send + Sync {
    /// Restore `dump` into `tenant`.
    ///
    /// `backup` holds the versions embedded in the dump. `progress` must be
    /// in [`RestoreState::Parsed`]; it ends in `Committed` or `RolledBack`.
    async fn restore(
        &self,
        tenant: &TenantConfig,
        dump: &ParsedDump,
        backup: &VersionSnapshot,
        strict: bool,
        progress: &mut RestoreProgress,
    ) -> Result<RestoreReport, RestoreError>;
}

/// [`RestoreEngine`] running the whole restore in one transaction.
///
/// A savepoint named `pre_restore` is taken before the first statement.
/// Any failure rolls back to it and then rolls back the transaction, so a
/// failed restore leaves no trace. On success the metadata row gets its
/// pre-restore schema and app version back before the commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgRestoreEngine;

pub(crate) fn truncate_statement(table: &QualifiedTable) -> String {
    format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", table.quoted())
}

async fn execute(conn: &mut PgConnection, statement: &str) -> Result<(), RestoreError> {
    sqlx::query(statement)
        .execute(&mut *conn)
        .await
        .map(|_| ())
        .map_err(|e| RestoreError::transaction(statement, &e))
}

#[async_trait]
impl RestoreEngine for PgRestoreEngine {
    #[instrument(skip_all, fields(tenant = %tenant.id, strict = strict))]
    async fn restore(
        &self,
        tenant: &TenantConfig,
        dump: &ParsedDump,
        backup: &VersionSnapshot,
        strict: bool,
        progress: &mut RestoreProgress,
    ) -> Result<RestoreReport, RestoreError> {
        let mut conn = match connect(&tenant.connection).await {
            Ok(conn) => conn,
            Err(e) => {
                progress.roll_back();
                return Err(e.into());
            }
        };
        let mut tx = match conn.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                progress.roll_back();
                return Err(RestoreError::transaction("begin", &e));
            }
        };

        let outcome = match execute(&mut tx, "SAVEPOINT pre_restore").await {
            Ok(()) => restore_body(&mut tx, tenant, dump, backup, strict, progress).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => {
                if let Err(e) = tx.commit().await {
                    progress.roll_back();
                    return Err(RestoreError::transaction("commit", &e));
                }
                progress.advance(RestoreState::Committed)?;
                info!(
                    mode = %report.mode,
                    tables = report.tables.len(),
                    rows = report.tables.iter().map(|t| t.inserted).sum::<u64>(),
                    "restore committed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, state = %progress.state(), "restore failed, rolling back");
                if let Err(rb) = execute(&mut tx, "ROLLBACK TO SAVEPOINT pre_restore").await {
                    warn!(error = %rb, "rollback to pre_restore failed");
                }
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "transaction rollback failed");
                }
                progress.roll_back();
                Err(e)
            }
        }
    }
}

async fn restore_body(
    conn: &mut PgConnection,
    tenant: &TenantConfig,
    dump: &ParsedDump,
    backup: &VersionSnapshot,
    strict: bool,
    progress: &mut RestoreProgress,
) -> Result<RestoreReport, RestoreError> {
    let current = versions::read_current(conn, &tenant.metadata_table).await?;
    info!(
        backup = backup.schema_version.as_deref().unwrap_or("unknown"),
        current = current.schema_version.as_deref().unwrap_or("unknown"),
        "schema versions"
    );
    let mode = select_mode(
        strict,
        backup.schema_version.as_deref(),
        current.schema_version.as_deref(),
    )?;
    progress.advance(RestoreState::ModeSelected(mode))?;

    // Plan every table before the first mutation so that a strict-mode
    // column mismatch or a missing table changes nothing.
    let mut plans = Vec::with_capacity(tenant.tables.len());
    for table in tenant.restore_order() {
        let live = live_columns(conn, table).await?;
        let plan = dump
            .block(table)
            .map(|block| InsertPlan::for_mode(mode, table, &block.columns, &live))
            .transpose()?;
        plans.push((table, plan));
    }

    for table in tenant.truncate_order() {
        execute(conn, &truncate_statement(table)).await?;
    }
    progress.advance(RestoreState::Truncated)?;

    let mut tables = Vec::with_capacity(plans.len());
    for (index, (table, plan)) in plans.iter().enumerate() {
        progress.advance(RestoreState::Restoring(index))?;
        let report = match (plan, dump.block(table)) {
            (Some(plan), Some(block)) => restore_table(conn, plan, block).await?,
            _ => {
                info!(%table, "no rows in backup");
                TableReport {
                    table: table.to_string(),
                    ..TableReport::default()
                }
            }
        };
        tables.push(report);
    }

    for table in tenant.restore_order() {
        sequences::realign(conn, table).await?;
    }
    progress.advance(RestoreState::SequencesRealigned)?;

    versions::write_back(conn, &tenant.metadata_table, &current).await?;
    progress.advance(RestoreState::VersionsRestored)?;

    Ok(RestoreReport {
        mode,
        schema: SchemaVersions {
            current: current.schema_version,
            backup: backup.schema_version.clone(),
        },
        tables,
    })
}

/// Insert one table's rows with its user triggers suspended.
///
/// The suspension happens under a savepoint. On failure the savepoint is
/// rolled back, which also undoes the suspension, before the error
/// propagates.
async fn restore_table(
    conn: &mut PgConnection,
    plan: &InsertPlan,
    block: &CopyBlock,
) -> Result<TableReport, RestoreError> {
    let table = plan.table();
    let mut report = TableReport {
        table: table.to_string(),
        inserted: 0,
        skipped: block.rejected_rows,
        ignored_columns: plan.ignored_columns().to_vec(),
    };
    if !report.ignored_columns.is_empty() {
        info!(%table, columns = ?report.ignored_columns, "ignoring columns missing from live table");
    }
    let Some(statement) = plan.statement() else {
        warn!(%table, rows = block.rows.len(), "no backup column exists in the live table");
        report.skipped += block.rows.len() as u64;
        return Ok(report);
    };

    execute(conn, "SAVEPOINT restore_table").await?;
    match fill_table(conn, table, statement, plan, block).await {
        Ok(inserted) => {
            execute(conn, "RELEASE SAVEPOINT restore_table").await?;
            report.inserted = inserted;
            info!(%table, inserted, skipped = report.skipped, "table restored");
            Ok(report)
        }
        Err(e) => {
            if let Err(rb) = execute(conn, "ROLLBACK TO SAVEPOINT restore_table").await {
                warn!(%table, error = %rb, "rollback to table savepoint failed");
            }
            Err(e)
        }
    }
}

async fn fill_table(
    conn: &mut PgConnection,
    table: &QualifiedTable,
    statement: &str,
    plan: &InsertPlan,
    block: &CopyBlock,
) -> Result<u64, RestoreError> {
    triggers::suspend(conn, table).await?;
    let mut inserted = 0;
    for row in &block.rows {
        let mut query = sqlx::query(statement);
        for value in plan.values(row) {
            query = query.bind(value);
        }
        query
            .execute(&mut *conn)
            .await
            .map_err(|e| RestoreError::transaction(&format!("inserting into {table}"), &e))?;
        inserted += 1;
    }
    triggers::resume(conn, table).await?;
    Ok(inserted)
}


#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use std::collections::HashSet;

    use pgvault_core::RestoreMode;
    use pgvault_dump::{backup_versions, parse_dump};

    use super::*;
    use crate::testing::{drop_schema, live_tenant, setup_schema};

    async fn parsed(tenant: &TenantConfig, text: &str) -> (ParsedDump, VersionSnapshot) {
        let retain: HashSet<_> = tenant.retained_tables().into_iter().collect();
        let dump = parse_dump(text.as_bytes(), &retain).await.unwrap();
        let versions = backup_versions(&dump, &tenant.metadata_table, tenant.version_offset);
        (dump, versions)
    }

    fn parsed_progress() -> RestoreProgress {
        let mut progress = RestoreProgress::new();
        for state in [
            RestoreState::Authorized,
            RestoreState::Downloaded,
            RestoreState::Parsed,
        ] {
            progress.advance(state).unwrap();
        }
        progress
    }

    async fn query_strings(tenant: &TenantConfig, sql: &str) -> Vec<String> {
        let mut conn = connect(&tenant.connection).await.unwrap();
        let rows: Vec<(String,)> = sqlx::query_as(sql).fetch_all(&mut conn).await.unwrap();
        conn.close().await.unwrap();
        rows.into_iter().map(|(s,)| s).collect()
    }

    fn backup_text(schema: &str, version: &str, person_rows: &str) -> String {
        format!(
            "COPY {schema}.app_config (id, app_version, schema_version, last_data_export, updated_at) FROM stdin;\n\
             1\t1.0.0\t{version}\t\\N\t\\N\n\
             \\.\n\
             COPY {schema}.person (id, name, legacy_field) FROM stdin;\n\
             {person_rows}\
             \\.\n"
        )
    }

    #[tokio::test]
    async fn tolerant_round_trip_realigns_sequences() {
        let (tenant, schema) = live_tenant(&["person", "booking"]);
        setup_schema(&tenant, &schema).await;
        let (dump, backup) = parsed(&tenant, &backup_text(&schema, "3", "1\tAlice\told\n")).await;

        let mut progress = parsed_progress();
        let report = PgRestoreEngine
            .restore(&tenant, &dump, &backup, false, &mut progress)
            .await
            .unwrap();

        assert_eq!(report.mode, RestoreMode::Tolerant);
        assert_eq!(report.schema.current.as_deref(), Some("4"));
        assert_eq!(report.schema.backup.as_deref(), Some("3"));
        assert_eq!(report.tables[0].inserted, 1);
        assert_eq!(report.tables[0].ignored_columns, ["legacy_field"]);
        assert_eq!(progress.state(), RestoreState::Committed);

        let people = query_strings(
            &tenant,
            &format!("SELECT id::text || ':' || name FROM {schema}.person ORDER BY id"),
        )
        .await;
        assert_eq!(people, ["1:Alice"]);

        let next = query_strings(
            &tenant,
            &format!("SELECT nextval(pg_get_serial_sequence('{schema}.person', 'id'))::text"),
        )
        .await;
        assert!(next[0].parse::<i64>().unwrap() >= 2);

        // The audit trigger on person stayed quiet during the restore.
        let audited = query_strings(&tenant, &format!("SELECT count(*)::text FROM {schema}.audit_log")).await;
        assert_eq!(audited, ["0"]);

        drop_schema(&tenant, &schema).await;
    }

    #[tokio::test]
    async fn strict_mismatch_leaves_rows_untouched() {
        let (tenant, schema) = live_tenant(&["person", "booking"]);
        setup_schema(&tenant, &schema).await;
        let (dump, backup) = parsed(&tenant, &backup_text(&schema, "3", "1\tAlice\told\n")).await;

        let mut progress = parsed_progress();
        let err = PgRestoreEngine
            .restore(&tenant, &dump, &backup, true, &mut progress)
            .await
            .unwrap_err();

        assert!(matches!(err, RestoreError::SchemaMismatch(_)));
        assert_eq!(progress.state(), RestoreState::RolledBack);
        let people = query_strings(&tenant, &format!("SELECT name FROM {schema}.person ORDER BY id")).await;
        assert_eq!(people, ["Old"]);

        drop_schema(&tenant, &schema).await;
    }

    #[tokio::test]
    async fn strict_restore_skips_short_rows() {
        let (tenant, schema) = live_tenant(&["person", "booking"]);
        setup_schema(&tenant, &schema).await;
        let text = format!(
            "COPY {schema}.app_config (id, app_version, schema_version, last_data_export, updated_at) FROM stdin;\n\
             1\t2.0.0\t4\t\\N\t\\N\n\
             \\.\n\
             COPY {schema}.person (id, name, nickname, email) FROM stdin;\n\
             1\tAlice\tAl\ta@example.com\n\
             2\tBob\tBobby\n\
             3\tCarol\t\\N\tc@example.com\n\
             \\.\n"
        );
        let (dump, backup) = parsed(&tenant, &text).await;

        let mut progress = parsed_progress();
        let report = PgRestoreEngine
            .restore(&tenant, &dump, &backup, true, &mut progress)
            .await
            .unwrap();

        assert_eq!(report.mode, RestoreMode::Strict);
        assert_eq!(report.tables[0].inserted, 2);
        assert_eq!(report.tables[0].skipped, 1);
        let people = query_strings(&tenant, &format!("SELECT name FROM {schema}.person ORDER BY id")).await;
        assert_eq!(people, ["Alice", "Carol"]);

        drop_schema(&tenant, &schema).await;
    }

    #[tokio::test]
    async fn metadata_versions_survive_restore() {
        let (tenant, schema) = live_tenant(&["app_config", "person", "booking"]);
        setup_schema(&tenant, &schema).await;
        let (dump, backup) = parsed(&tenant, &backup_text(&schema, "3", "1\tAlice\told\n")).await;

        let mut progress = parsed_progress();
        PgRestoreEngine
            .restore(&tenant, &dump, &backup, false, &mut progress)
            .await
            .unwrap();

        let versions = query_strings(
            &tenant,
            &format!("SELECT schema_version::text || '/' || app_version FROM {schema}.app_config"),
        )
        .await;
        assert_eq!(versions, ["4/2.0.0"]);

        drop_schema(&tenant, &schema).await;
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_everything() {
        let (tenant, schema) = live_tenant(&["person", "booking"]);
        setup_schema(&tenant, &schema).await;
        let text = format!(
            "{}COPY {schema}.booking (id, person_id, note) FROM stdin;\n\
             1\t42\tdangling\n\
             \\.\n",
            backup_text(&schema, "3", "1\tAlice\told\n")
        );
        let (dump, backup) = parsed(&tenant, &text).await;

        let mut progress = parsed_progress();
        let err = PgRestoreEngine
            .restore(&tenant, &dump, &backup, false, &mut progress)
            .await
            .unwrap_err();

        assert!(matches!(err, RestoreError::Transaction(_)));
        assert_eq!(progress.state(), RestoreState::RolledBack);
        let people = query_strings(&tenant, &format!("SELECT name FROM {schema}.person ORDER BY id")).await;
        assert_eq!(people, ["Old"]);

        drop_schema(&tenant, &schema).await;
    }
}
