use pgvault_core::version::normalize_version;
use pgvault_core::{ParsedDump, QualifiedTable, Row, VersionSnapshot};

const SCHEMA_VERSION_COLUMN: &str = "schema_version";
const APP_VERSION_COLUMN: &str = "app_version";

/// Read the schema and app version embedded in a dump.
///
/// The versions come from the metadata table's copy-block. The schema
/// version column is located by name in the block header, or at
/// `fallback_offset` when the header does not name it, and the first row
/// with a non-empty value there wins. Anything absent or blank is reported
/// as unknown instead of failing.
pub fn backup_versions(
    dump: &ParsedDump,
    metadata_table: &QualifiedTable,
    fallback_offset: usize,
) -> VersionSnapshot {
    let Some(block) = dump.block(metadata_table) else {
        return VersionSnapshot::default();
    };
    let field = |row: &Row, index: Option<usize>| {
        index
            .and_then(|i| row.get(i))
            .and_then(|value| normalize_version(value.as_deref()))
            .map(str::to_owned)
    };
    let schema_index = block
        .column_index(SCHEMA_VERSION_COLUMN)
        .or(Some(fallback_offset));
    let app_index = block.column_index(APP_VERSION_COLUMN);
    block
        .rows
        .iter()
        .find_map(|row| {
            field(row, schema_index).map(|schema_version| VersionSnapshot {
                schema_version: Some(schema_version),
                app_version: field(row, app_index),
            })
        })
        .or_else(|| {
            block.rows.first().map(|row| VersionSnapshot {
                schema_version: None,
                app_version: field(row, app_index),
            })
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::parser::parse_dump;

    fn app_config() -> QualifiedTable {
        QualifiedTable::parse("inventory.app_config").unwrap()
    }

    async fn parse(input: &str) -> ParsedDump {
        let retain: HashSet<_> = [app_config()].into_iter().collect();
        parse_dump(input.as_bytes(), &retain).await.unwrap()
    }

    #[tokio::test]
    async fn reads_named_columns() {
        let dump = parse(
            "COPY inventory.app_config (id, app_version, schema_version) FROM stdin;\n\
             1\t1.2.0\t4\n\\.\n",
        )
        .await;
        let versions = backup_versions(&dump, &app_config(), 5);
        assert_eq!(versions.schema_version.as_deref(), Some("4"));
        assert_eq!(versions.app_version.as_deref(), Some("1.2.0"));
    }

    #[tokio::test]
    async fn falls_back_to_fixed_offset() {
        let dump = parse(
            "COPY inventory.app_config (a, b, c, d, e, f) FROM stdin;\n\
             1\t2\t3\t4\t5\t7\n\\.\n",
        )
        .await;
        let versions = backup_versions(&dump, &app_config(), 5);
        assert_eq!(versions.schema_version.as_deref(), Some("7"));
        assert_eq!(versions.app_version, None);
    }

    #[tokio::test]
    async fn unknown_when_absent() {
        let missing_block = parse("COPY public.other (id) FROM stdin;\n1\n\\.\n").await;
        assert_eq!(
            backup_versions(&missing_block, &app_config(), 5),
            VersionSnapshot::default()
        );

        let short_row = parse("COPY inventory.app_config (id, name) FROM stdin;\n1\tx\n\\.\n").await;
        assert_eq!(backup_versions(&short_row, &app_config(), 5).schema_version, None);

        let null_version = parse(
            "COPY inventory.app_config (id, schema_version) FROM stdin;\n1\t\\N\n\\.\n",
        )
        .await;
        assert_eq!(backup_versions(&null_version, &app_config(), 5).schema_version, None);

        let skips_blank_rows = parse(
            "COPY inventory.app_config (id, schema_version) FROM stdin;\n1\t\n2\t9\n\\.\n",
        )
        .await;
        assert_eq!(
            backup_versions(&skips_blank_rows, &app_config(), 5).schema_version.as_deref(),
            Some("9")
        );

        let empty_block = parse("COPY inventory.app_config (id, schema_version) FROM stdin;\n\\.\n").await;
        assert_eq!(backup_versions(&empty_block, &app_config(), 5).schema_version, None);
    }
}
