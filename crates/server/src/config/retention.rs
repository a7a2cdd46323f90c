use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::ServerError;

/// Rotation of old artifacts after each successful upload.
#[derive(Debug, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// IANA zone used for daily, weekly, monthly and yearly buckets.
    /// Tier windows are always measured in UTC.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Log what would be deleted without deleting anything.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timezone: default_timezone(),
            dry_run: false,
        }
    }
}

impl RetentionConfig {
    pub fn tz(&self) -> Result<Tz, ServerError> {
        self.timezone
            .parse()
            .map_err(|_| ServerError::Config(format!("unknown retention.timezone: {}", self.timezone)))
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_owned()
}
