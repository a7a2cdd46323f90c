use pgvault_store::StoreError;
use thiserror::Error;

/// Errors raised by the retention rotator.
#[derive(Debug, Error)]
pub enum RetentionError {
    /// Tiers overlap, leave gaps, or do not cover all ages.
    #[error("invalid retention schedule: {0}")]
    InvalidSchedule(String),

    /// Listing the tenant's artifacts failed. Individual delete failures are
    /// reported on the rotation report instead.
    #[error(transparent)]
    Store(#[from] StoreError),
}
