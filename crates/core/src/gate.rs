use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Slack applied to the last mutation time before comparing watermarks.
pub const EXPORT_SLACK_SECONDS: i64 = 60;

/// Watermarks read from a tenant's metadata row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermarks {
    /// Last time a dump of this tenant was exported.
    pub last_export: Option<DateTime<Utc>>,
    /// Last time data in the tenant changed.
    pub last_mutation: Option<DateTime<Utc>>,
}

/// Why a dump is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProceedReason {
    /// At least one watermark is absent.
    MissingWatermark,
    /// Data changed after the last export.
    Changed,
    /// The watermarks could not be read.
    Unreadable,
}

/// Outcome of the change gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The last export already covers every mutation.
    Skip {
        last_export: DateTime<Utc>,
        last_mutation: DateTime<Utc>,
    },
    Proceed(ProceedReason),
}

impl GateDecision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }
}

impl Watermarks {
    /// Decide whether a new dump is needed.
    ///
    /// The dump is skipped only when both watermarks are present and
    /// `last_export >= last_mutation - 1 minute`.
    pub fn decide(&self) -> GateDecision {
        match (self.last_export, self.last_mutation) {
            (Some(last_export), Some(last_mutation)) => {
                if last_export >= last_mutation - TimeDelta::seconds(EXPORT_SLACK_SECONDS) {
                    GateDecision::Skip {
                        last_export,
                        last_mutation,
                    }
                } else {
                    GateDecision::Proceed(ProceedReason::Changed)
                }
            }
            _ => GateDecision::Proceed(ProceedReason::MissingWatermark),
        }
    }
}
