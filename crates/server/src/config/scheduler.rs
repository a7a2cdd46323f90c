use std::time::Duration;

use serde::Deserialize;

/// Periodic backups of every configured tenant.
///
/// Each run goes through the same path as `POST /backup/{tenant}`, so the
/// change gate skips tenants whose data did not change.
#[derive(Debug, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Seconds between runs. The first run happens one interval after startup.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_interval(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

fn default_interval() -> u64 {
    6 * 60 * 60
}
