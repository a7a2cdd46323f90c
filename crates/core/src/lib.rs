pub mod artifact;
pub mod dump;
pub mod error;
pub mod gate;
pub mod restore;
pub mod table;
pub mod tenant;
pub mod testing;
pub mod version;

pub use artifact::{
    ARTIFACT_EXTENSION, ARTIFACT_TIMESTAMP_FORMAT, Artifact, ArtifactNaming,
    DEFAULT_ARTIFACT_PREFIX,
};
pub use dump::{CopyBlock, ParseAnomaly, ParsedDump, Row};
pub use error::CoreError;
pub use gate::{EXPORT_SLACK_SECONDS, GateDecision, ProceedReason, Watermarks};
pub use restore::{RestoreProgress, RestoreReport, RestoreState, SchemaVersions, TableReport};
pub use table::{DEFAULT_SCHEMA, QualifiedTable, is_plain_ident, quote_ident};
pub use tenant::{
    ConnectionSettings, DEFAULT_SSL_MODE, FolderKind, TenantConfig, TenantFolders, TenantId,
};
pub use version::{RestoreMode, SchemaMismatch, VersionSnapshot, select_mode};
