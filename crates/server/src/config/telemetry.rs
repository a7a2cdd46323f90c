use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_OTLP_GRPC_ENDPOINT: &str = "http://localhost:4317";
pub const DEFAULT_SERVICE_NAME: &str = "pgvault";

/// OTLP transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    /// HTTP with protobuf bodies, usually on port 4318.
    Http,
}

impl fmt::Display for OtlpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Grpc => "grpc",
            Self::Http => "http",
        })
    }
}

/// `[telemetry]`: span export for backup, rotation and restore runs.
///
/// Off by default; pgvault then only logs to stdout. A backup span covers the
/// gate check, the `pg_dump` child and the upload, and a restore span covers
/// the download, parse and the whole database transaction.
///
/// ```toml
/// [telemetry]
/// enabled = true
/// protocol = "http"
/// endpoint = "http://tempo.internal:4318"
/// sample_ratio = 0.5
///
/// [telemetry.resource_attributes]
/// "deployment.environment" = "production"
/// ```
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Collector address for the chosen protocol.
    pub endpoint: String,
    /// Reported as `service.name`; set it per deployment when several
    /// pgvault instances share a collector.
    pub service_name: String,
    /// Fraction of root spans kept. Values outside `0.0..=1.0` are clamped.
    pub sample_ratio: f64,
    pub protocol: OtlpProtocol,
    /// Export timeout in seconds.
    pub timeout_seconds: u64,
    /// Extra resource attributes, attached to every span.
    pub resource_attributes: HashMap<String, String>,
}

impl TelemetryConfig {
    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: DEFAULT_OTLP_GRPC_ENDPOINT.to_owned(),
            service_name: DEFAULT_SERVICE_NAME.to_owned(),
            sample_ratio: 1.0,
            protocol: OtlpProtocol::Grpc,
            timeout_seconds: 10,
            resource_attributes: HashMap::new(),
        }
    }
}
