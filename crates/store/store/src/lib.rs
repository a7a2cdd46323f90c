pub mod error;
pub mod store;
pub mod testing;
pub mod timeout;

pub use error::StoreError;
pub use store::ArtifactStore;
pub use timeout::TimeoutStore;
