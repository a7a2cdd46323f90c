use std::collections::HashSet;
use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use pgvault_core::{CopyBlock, ParseAnomaly, ParsedDump, QualifiedTable};

use crate::decode::decode_field;
use crate::error::DumpError;

/// Line terminating a copy-block.
pub const END_OF_BLOCK: &str = "\\.";

const COPY_PREFIX: &str = "COPY ";
const COPY_SUFFIX: &str = " FROM stdin;";

/// Table and column list declared by a copy-block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyHeader {
    /// Identifier parts of the table name, unquoted (`[schema,] table`).
    pub table_parts: Vec<String>,
    pub columns: Vec<String>,
}

impl CopyHeader {
    /// Resolve the header's table to a [`QualifiedTable`].
    ///
    /// Names that are not plain identifiers can never be on a tenant's
    /// table list, so they resolve to `None`.
    pub fn table(&self) -> Option<QualifiedTable> {
        match self.table_parts.as_slice() {
            [name] => QualifiedTable::from_parts(pgvault_core::DEFAULT_SCHEMA, name).ok(),
            [schema, name] => QualifiedTable::from_parts(schema, name).ok(),
            _ => None,
        }
    }
}

/// Index of the first character matching `pred` outside double quotes.
fn find_unquoted(s: &str, pred: impl Fn(char) -> bool) -> Option<usize> {
    let mut quoted = false;
    for (i, c) in s.char_indices() {
        if c == '"' {
            quoted = !quoted;
        } else if !quoted && pred(c) {
            return Some(i);
        }
    }
    None
}

/// Split a list of possibly-quoted identifiers on `sep`.
///
/// Whitespace outside quotes is ignored and `""` inside quotes is a literal
/// quote. Returns `None` on unbalanced quotes or empty items.
fn split_identifiers(raw: &str, sep: char) -> Option<Vec<String>> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if quoted {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' {
            quoted = true;
        } else if c == sep {
            items.push(std::mem::take(&mut current));
        } else if !c.is_whitespace() {
            current.push(c);
        }
    }
    if quoted {
        return None;
    }
    items.push(current);
    if items.iter().any(String::is_empty) {
        return None;
    }
    Some(items)
}

/// Parse `COPY schema.table (col, ...) FROM stdin;`.
pub fn parse_copy_header(line: &str) -> Option<CopyHeader> {
    let body = line.strip_prefix(COPY_PREFIX)?.strip_suffix(COPY_SUFFIX)?;
    let split_at = find_unquoted(body, |c| c == ' ' || c == '(')?;
    let (table_raw, rest) = body.split_at(split_at);
    let columns_raw = rest.trim().strip_prefix('(')?.strip_suffix(')')?;
    Some(CopyHeader {
        table_parts: split_identifiers(table_raw, '.')?,
        columns: split_identifiers(columns_raw, ',')?,
    })
}

fn is_copy_header(line: &str) -> bool {
    line.starts_with(COPY_PREFIX) && line.ends_with(COPY_SUFFIX)
}

enum Cursor {
    Outside,
    Keeping(CopyBlock),
    Discarding(String),
}

/// Stream a textual dump and collect the copy-blocks of `retain`.
///
/// Memory use is bounded by the longest line plus the retained rows. Blocks
/// for other tables are skipped. Rows whose arity differs from the header
/// are rejected individually. A block cut off by end of input is dropped
/// and the dump is marked truncated; complete blocks read before it are
/// kept.
pub async fn parse_dump<R>(
    mut reader: R,
    retain: &HashSet<QualifiedTable>,
) -> Result<ParsedDump, DumpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut parsed = ParsedDump::default();
    let mut cursor = Cursor::Outside;
    let mut buf = Vec::new();
    let mut line_no: u64 = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        line_no += 1;
        let mut raw: &[u8] = &buf;
        if let Some(stripped) = raw.strip_suffix(b"\n") {
            raw = stripped;
        }
        if let Some(stripped) = raw.strip_suffix(b"\r") {
            raw = stripped;
        }
        let line = String::from_utf8_lossy(raw);

        cursor = match cursor {
            Cursor::Outside => open_block(&line, line_no, retain, &mut parsed),
            Cursor::Keeping(mut block) => {
                if line == END_OF_BLOCK {
                    debug!(table = %block.table, rows = block.rows.len(), "copy-block complete");
                    store_block(&mut parsed, block);
                    Cursor::Outside
                } else {
                    let row = line.split('\t').map(decode_field).collect();
                    if let Err(anomaly) = block.push_row(row, line_no) {
                        warn!(%anomaly, "skipping malformed row");
                        parsed.anomalies.push(anomaly);
                    }
                    Cursor::Keeping(block)
                }
            }
            Cursor::Discarding(table) => {
                if line == END_OF_BLOCK {
                    Cursor::Outside
                } else {
                    Cursor::Discarding(table)
                }
            }
        };
    }

    match cursor {
        Cursor::Outside => {}
        Cursor::Keeping(block) => {
            let anomaly = ParseAnomaly::Truncated {
                table: block.table.to_string(),
                rows: block.rows.len(),
            };
            warn!(%anomaly, "dump ended inside a copy-block");
            parsed.anomalies.push(anomaly);
            parsed.truncated = true;
        }
        Cursor::Discarding(table) => {
            debug!(table = %table, "dump ended inside a discarded copy-block");
            parsed.truncated = true;
        }
    }

    info!(
        lines = line_no,
        tables = parsed.blocks.len(),
        rows = parsed.total_rows(),
        discarded_blocks = parsed.discarded_blocks,
        anomalies = parsed.anomalies.len(),
        truncated = parsed.truncated,
        "dump parsed"
    );
    Ok(parsed)
}

fn open_block(
    line: &str,
    line_no: u64,
    retain: &HashSet<QualifiedTable>,
    parsed: &mut ParsedDump,
) -> Cursor {
    if !is_copy_header(line) {
        return Cursor::Outside;
    }
    let Some(header) = parse_copy_header(line) else {
        let anomaly = ParseAnomaly::MalformedHeader {
            line: line_no,
            header: line.to_owned(),
        };
        warn!(%anomaly, "skipping copy-block");
        parsed.anomalies.push(anomaly);
        return Cursor::Discarding(line.to_owned());
    };
    match header.table() {
        Some(table) if retain.contains(&table) => {
            Cursor::Keeping(CopyBlock::new(table, header.columns))
        }
        _ => {
            let name = header.table_parts.join(".");
            debug!(table = %name, "discarding copy-block for table outside the restore list");
            parsed.discarded_blocks += 1;
            Cursor::Discarding(name)
        }
    }
}

/// A table may legitimately appear twice; rows of later blocks are appended
/// when the column lists agree.
fn store_block(parsed: &mut ParsedDump, block: CopyBlock) {
    match parsed.blocks.get_mut(&block.table) {
        Some(existing) if existing.columns == block.columns => {
            existing.rows.extend(block.rows);
            existing.rejected_rows += block.rejected_rows;
        }
        Some(existing) => {
            warn!(table = %block.table, "repeated copy-block with different columns replaces the earlier one");
            *existing = block;
        }
        None => {
            parsed.blocks.insert(block.table.clone(), block);
        }
    }
}

/// Open a dump file and parse it with [`parse_dump`].
pub async fn read_dump_file(
    path: &Path,
    retain: &HashSet<QualifiedTable>,
) -> Result<ParsedDump, DumpError> {
    let file = tokio::fs::File::open(path).await?;
    parse_dump(BufReader::new(file), retain).await
}
