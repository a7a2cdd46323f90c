pub mod catalog;
pub mod connect;
pub mod error;
pub mod lease;
pub mod plan;
pub mod restore;
pub mod sequences;
#[cfg(all(test, feature = "integration"))]
mod testing;
pub mod triggers;
pub mod versions;
pub mod watermark;

pub use connect::{connect, connect_options};
pub use error::{ConnectionError, GateError, LeaseError, RestoreError};
pub use lease::{LeaseGuard, PgAdvisoryLeases, TenantLeases, lease_key};
pub use plan::InsertPlan;
pub use restore::{PgRestoreEngine, RestoreEngine};
pub use watermark::{PgWatermarks, WatermarkStore};
