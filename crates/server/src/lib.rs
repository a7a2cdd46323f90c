pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod lock;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod shutdown;
pub mod store_factory;
pub mod telemetry;
