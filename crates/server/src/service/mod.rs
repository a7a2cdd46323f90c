pub mod backup;
pub mod restore;

pub use backup::{BackupOutcome, BackupService};
pub use restore::RestoreService;
