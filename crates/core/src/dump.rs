use std::collections::HashMap;

use thiserror::Error;

use crate::table::QualifiedTable;

/// One row of a copy-block. `None` is SQL NULL.
pub type Row = Vec<Option<String>>;

/// Recoverable problems met while reading a dump.
///
/// None of these abort a parse: the offending row or block is skipped and
/// the anomaly is recorded on the [`ParsedDump`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAnomaly {
    #[error("{table} line {line}: expected {expected} fields, found {found}")]
    ArityMismatch {
        table: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: unrecognized copy header: {header}")]
    MalformedHeader { line: u64, header: String },

    #[error("copy-block for {table} was not terminated; {rows} rows dropped")]
    Truncated { table: String, rows: usize },
}

/// The rows of one table read from a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyBlock {
    pub table: QualifiedTable,
    /// Columns in the order declared by the block header.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Rows dropped because their arity did not match `columns`.
    pub rejected_rows: u64,
}

impl CopyBlock {
    pub fn new(table: QualifiedTable, columns: Vec<String>) -> Self {
        Self {
            table,
            columns,
            rows: Vec::new(),
            rejected_rows: 0,
        }
    }

    /// Append a row, rejecting it when its arity differs from the header.
    pub fn push_row(&mut self, row: Row, line: u64) -> Result<(), ParseAnomaly> {
        if row.len() != self.columns.len() {
            self.rejected_rows += 1;
            return Err(ParseAnomaly::ArityMismatch {
                table: self.table.to_string(),
                line,
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Result of parsing a dump against a table allow-list.
#[derive(Debug, Clone, Default)]
pub struct ParsedDump {
    pub blocks: HashMap<QualifiedTable, CopyBlock>,
    /// The input ended inside a copy-block.
    pub truncated: bool,
    /// Blocks skipped because their table is not on the allow-list.
    pub discarded_blocks: u64,
    pub anomalies: Vec<ParseAnomaly>,
}

impl ParsedDump {
    pub fn block(&self, table: &QualifiedTable) -> Option<&CopyBlock> {
        self.blocks.get(table)
    }

    pub fn total_rows(&self) -> usize {
        self.blocks.values().map(|b| b.rows.len()).sum()
    }
}
