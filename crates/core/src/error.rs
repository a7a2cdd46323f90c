use thiserror::Error;

use crate::restore::RestoreState;
use crate::tenant::FolderKind;

/// Errors raised while building or validating core domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A tenant identifier was empty or contained forbidden characters.
    #[error("invalid tenant id: {0:?}")]
    InvalidTenantId(String),

    /// A table name could not be parsed into `schema.table`.
    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    /// The tenant has no folder configured for the requested kind.
    #[error("tenant {tenant} has no {kind} folder configured")]
    MissingFolder {
        /// Tenant identifier.
        tenant: String,
        /// Folder kind that was requested.
        kind: FolderKind,
    },

    /// A restore session attempted a transition the state machine forbids.
    #[error("invalid restore transition: {from} -> {to}")]
    InvalidTransition {
        /// State the session was in.
        from: RestoreState,
        /// State the session tried to enter.
        to: RestoreState,
    },
}
