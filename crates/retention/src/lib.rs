pub mod error;
pub mod plan;
pub mod rotate;
pub mod tier;

pub use error::RetentionError;
pub use plan::{RetentionPlan, plan};
pub use rotate::{RotationReport, Rotator};
pub use tier::{CalendarBucket, Horizon, KeepRule, RetentionSchedule, RetentionTier};
