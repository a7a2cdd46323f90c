use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Schema assumed when a configured table name is not qualified.
pub const DEFAULT_SCHEMA: &str = "public";

static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier pattern is valid")
});

/// Quote an SQL identifier, doubling any embedded double quote.
///
/// Every identifier that ends up in dynamically built SQL goes through this
/// helper, even when it was already validated.
pub fn quote_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 2);
    out.push('"');
    for ch in ident.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Returns `true` if `ident` is a plain identifier (letters, digits, `_`, `$`).
pub fn is_plain_ident(ident: &str) -> bool {
    IDENT_RE.is_match(ident)
}

/// A schema-qualified table name taken from tenant configuration.
///
/// Both parts are validated on construction so that nothing but plain
/// identifiers can reach the SQL builders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedTable {
    schema: String,
    name: String,
}

impl QualifiedTable {
    /// Build a table name from its two parts.
    pub fn from_parts(schema: &str, name: &str) -> Result<Self, CoreError> {
        if !is_plain_ident(schema) || !is_plain_ident(name) {
            return Err(CoreError::InvalidTableName(format!("{schema}.{name}")));
        }
        Ok(Self {
            schema: schema.to_owned(),
            name: name.to_owned(),
        })
    }

    /// Parse `schema.table`, or a bare `table` in the default schema.
    ///
    /// The input is an unquoted SQL name, so it is folded to lower case the
    /// way PostgreSQL folds unquoted identifiers: `Inventory.Person` names
    /// the same table as `inventory.person`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let folded = raw.trim().to_ascii_lowercase();
        let trimmed = folded.as_str();
        match trimmed.split_once('.') {
            Some((schema, name)) => Self::from_parts(schema, name)
                .map_err(|_| CoreError::InvalidTableName(raw.to_owned())),
            None => Self::from_parts(DEFAULT_SCHEMA, trimmed)
                .map_err(|_| CoreError::InvalidTableName(raw.to_owned())),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The quoted `"schema"."table"` form used in SQL statements.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl FromStr for QualifiedTable {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
