pub mod config;
pub mod error;
pub mod store;

pub use config::S3StoreConfig;
pub use store::S3ArtifactStore;
