use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use pgvault_core::Artifact;

use crate::tier::{KeepRule, RetentionSchedule};

/// Outcome of applying a schedule to a tenant's artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionPlan {
    /// Artifacts kept by some tier, newest first.
    pub keep: Vec<Artifact>,
    /// Artifacts no tier keeps, newest first.
    pub delete: Vec<Artifact>,
    /// Artifacts whose time could not be determined. They are never deleted.
    pub ignored: Vec<Artifact>,
}

impl RetentionPlan {
    pub fn is_noop(&self) -> bool {
        self.delete.is_empty()
    }
}

/// Decide which artifacts to keep.
///
/// `time_of` resolves each artifact's backup time; artifacts it cannot
/// resolve end up in [`RetentionPlan::ignored`]. The rest are walked newest
/// first. Every tier looks only at artifacts inside its window: interval
/// tiers keep an artifact when it is at least the interval older than the
/// previously kept one, bucket tiers keep the first artifact of each bucket.
/// An artifact is deleted only when no tier keeps it.
///
/// Applying the plan and planning again with the same `now` keeps the same
/// set and deletes nothing.
pub fn plan<F>(
    schedule: &RetentionSchedule,
    artifacts: &[Artifact],
    time_of: F,
    now: DateTime<Utc>,
    tz: Tz,
) -> RetentionPlan
where
    F: Fn(&Artifact) -> Option<DateTime<Utc>>,
{
    let mut ignored = Vec::new();
    let mut dated: Vec<(DateTime<Utc>, &Artifact)> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        match time_of(artifact) {
            Some(at) => dated.push((at, artifact)),
            None => ignored.push(artifact.clone()),
        }
    }
    dated.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.name.cmp(&a.1.name)));

    let mut kept = vec![false; dated.len()];
    for tier in schedule.tiers() {
        let in_window = dated
            .iter()
            .enumerate()
            .filter(|(_, (at, _))| tier.contains(*at, now));
        match tier.keep {
            KeepRule::Interval(interval) => {
                let mut last_kept: Option<DateTime<Utc>> = None;
                for (index, (at, _)) in in_window {
                    if last_kept.is_none_or(|prev| prev - *at >= interval) {
                        kept[index] = true;
                        last_kept = Some(*at);
                    }
                }
            }
            KeepRule::PerBucket(bucket) => {
                let mut seen = HashSet::new();
                for (index, (at, _)) in in_window {
                    if seen.insert(bucket.key(*at, tz)) {
                        kept[index] = true;
                    }
                }
            }
        }
    }

    let mut result = RetentionPlan {
        ignored,
        ..RetentionPlan::default()
    };
    for ((_, artifact), keep) in dated.into_iter().zip(kept) {
        if keep {
            result.keep.push(artifact.clone());
        } else {
            result.delete.push(artifact.clone());
        }
    }
    result
}
