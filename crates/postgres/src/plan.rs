use pgvault_core::{QualifiedTable, RestoreMode, Row, quote_ident};

use crate::catalog::LiveColumn;
use crate::error::RestoreError;

/// How the rows of one copy-block are written into the live table.
///
/// Every value is sent as text and cast to the live column type, so any
/// type with a text input function restores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPlan {
    table: QualifiedTable,
    /// Target columns, in dump order.
    columns: Vec<String>,
    /// Position of each target column in the dump row.
    sources: Vec<usize>,
    /// Dump columns with no live counterpart.
    ignored: Vec<String>,
    statement: Option<String>,
}

impl InsertPlan {
    /// Plan for `mode`. See [`InsertPlan::strict`] and [`InsertPlan::tolerant`].
    pub fn for_mode(
        mode: RestoreMode,
        table: &QualifiedTable,
        dump_columns: &[String],
        live: &[LiveColumn],
    ) -> Result<Self, RestoreError> {
        match mode {
            RestoreMode::Strict => Self::strict(table, dump_columns, live),
            RestoreMode::Tolerant => Ok(Self::tolerant(table, dump_columns, live)),
        }
    }

    /// Insert exactly the columns the dump declares. A dump column missing
    /// from the live table is an error.
    pub fn strict(
        table: &QualifiedTable,
        dump_columns: &[String],
        live: &[LiveColumn],
    ) -> Result<Self, RestoreError> {
        let mut targets = Vec::with_capacity(dump_columns.len());
        for (index, column) in dump_columns.iter().enumerate() {
            let Some(live_column) = live.iter().find(|c| &c.name == column) else {
                return Err(RestoreError::MissingColumn {
                    table: table.to_string(),
                    column: column.clone(),
                });
            };
            targets.push((index, live_column));
        }
        Ok(Self::build(table, &targets, Vec::new()))
    }

    /// Insert the intersection of dump and live columns. Dump columns the
    /// live table lacks are dropped; live columns the dump lacks keep their
    /// defaults.
    pub fn tolerant(table: &QualifiedTable, dump_columns: &[String], live: &[LiveColumn]) -> Self {
        let mut targets = Vec::with_capacity(dump_columns.len());
        let mut ignored = Vec::new();
        for (index, column) in dump_columns.iter().enumerate() {
            match live.iter().find(|c| &c.name == column) {
                Some(live_column) => targets.push((index, live_column)),
                None => ignored.push(column.clone()),
            }
        }
        Self::build(table, &targets, ignored)
    }

    fn build(table: &QualifiedTable, targets: &[(usize, &LiveColumn)], ignored: Vec<String>) -> Self {
        let statement = (!targets.is_empty()).then(|| {
            let columns = targets
                .iter()
                .map(|(_, c)| quote_ident(&c.name))
                .collect::<Vec<_>>()
                .join(", ");
            let values = targets
                .iter()
                .enumerate()
                .map(|(i, (_, c))| format!("CAST(${}::text AS {})", i + 1, c.data_type))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({columns}) OVERRIDING SYSTEM VALUE VALUES ({values})",
                table.quoted()
            )
        });
        Self {
            table: table.clone(),
            columns: targets.iter().map(|(_, c)| c.name.clone()).collect(),
            sources: targets.iter().map(|(i, _)| *i).collect(),
            ignored,
            statement,
        }
    }

    pub fn table(&self) -> &QualifiedTable {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn ignored_columns(&self) -> &[String] {
        &self.ignored
    }

    /// The `INSERT` statement, or `None` when no dump column survives.
    pub fn statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    /// Parameter values for one dump row, in statement order.
    pub fn values<'r>(&self, row: &'r Row) -> impl Iterator<Item = Option<&'r str>> {
        self.sources
            .iter()
            .map(move |&i| row.get(i).and_then(|v| v.as_deref()))
    }
}
