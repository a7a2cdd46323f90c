use std::fmt;

use chrono::{DateTime, Datelike, Months, TimeDelta, Utc};
use chrono_tz::Tz;

use crate::error::RetentionError;

/// An age boundary of a retention tier, measured back from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// No newer limit: the tier reaches up to (and past) the present.
    Now,
    /// A fixed duration before now.
    Ago(TimeDelta),
    /// A number of calendar months before now.
    MonthsAgo(u32),
    /// No older limit.
    Forever,
}

impl Horizon {
    /// The instant this horizon denotes, or `None` when unbounded.
    pub fn instant(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Now | Self::Forever => None,
            Self::Ago(age) => now.checked_sub_signed(age),
            Self::MonthsAgo(months) => now.checked_sub_months(Months::new(months)),
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Now => write!(f, "now"),
            Self::Ago(age) if age.num_days() > 0 && age.num_seconds() % 86_400 == 0 => {
                write!(f, "{}d", age.num_days())
            }
            Self::Ago(age) if age.num_hours() > 0 && age.num_seconds() % 3600 == 0 => {
                write!(f, "{}h", age.num_hours())
            }
            Self::Ago(age) => write!(f, "{}s", age.num_seconds()),
            Self::MonthsAgo(m) => write!(f, "{m}mo"),
            Self::Forever => write!(f, "forever"),
        }
    }
}

/// Calendar unit used by bucketed tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarBucket {
    Day,
    /// ISO-8601 week, keyed by ISO week-year.
    IsoWeek,
    Month,
    Year,
}

impl CalendarBucket {
    /// Bucket key of `at`, computed in `tz`.
    pub fn key(self, at: DateTime<Utc>, tz: Tz) -> (i32, u32) {
        let local = at.with_timezone(&tz);
        match self {
            Self::Day => (local.year(), local.ordinal()),
            Self::IsoWeek => {
                let week = local.iso_week();
                (week.year(), week.week())
            }
            Self::Month => (local.year(), local.month()),
            Self::Year => (local.year(), 0),
        }
    }
}

/// How a tier thins the artifacts in its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepRule {
    /// Walking newest first, keep an artifact only if it is at least this
    /// much older than the last one kept.
    Interval(TimeDelta),
    /// Keep the first artifact seen in each calendar bucket.
    PerBucket(CalendarBucket),
}

/// One (time window, keep rule) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionTier {
    pub name: String,
    /// Newer edge of the window (exclusive, except for [`Horizon::Now`]).
    pub newer: Horizon,
    /// Older edge of the window (inclusive).
    pub older: Horizon,
    pub keep: KeepRule,
}

impl RetentionTier {
    pub fn new(name: impl Into<String>, newer: Horizon, older: Horizon, keep: KeepRule) -> Self {
        Self {
            name: name.into(),
            newer,
            older,
            keep,
        }
    }

    /// Whether `at` falls inside this tier's window at `now`.
    pub fn contains(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let below_newer = self.newer.instant(now).is_none_or(|edge| at < edge);
        let above_older = self.older.instant(now).is_none_or(|edge| at >= edge);
        below_newer && above_older
    }
}

/// Ordered, contiguous list of retention tiers, finest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionSchedule {
    tiers: Vec<RetentionTier>,
}

impl Default for RetentionSchedule {
    /// The standard decay schedule:
    ///
    /// | window | keep |
    /// |---|---|
    /// | last 2 hours | one per 3 minutes |
    /// | 2 to 24 hours | one per 2 hours |
    /// | 1 to 7 days | one per calendar day |
    /// | 7 to 28 days | one per ISO week |
    /// | 28 days to 12 months | one per calendar month |
    /// | older than 12 months | one per calendar year |
    fn default() -> Self {
        Self {
            tiers: vec![
                RetentionTier::new(
                    "recent",
                    Horizon::Now,
                    Horizon::Ago(TimeDelta::hours(2)),
                    KeepRule::Interval(TimeDelta::minutes(3)),
                ),
                RetentionTier::new(
                    "hourly",
                    Horizon::Ago(TimeDelta::hours(2)),
                    Horizon::Ago(TimeDelta::hours(24)),
                    KeepRule::Interval(TimeDelta::hours(2)),
                ),
                RetentionTier::new(
                    "daily",
                    Horizon::Ago(TimeDelta::hours(24)),
                    Horizon::Ago(TimeDelta::days(7)),
                    KeepRule::PerBucket(CalendarBucket::Day),
                ),
                RetentionTier::new(
                    "weekly",
                    Horizon::Ago(TimeDelta::days(7)),
                    Horizon::Ago(TimeDelta::days(28)),
                    KeepRule::PerBucket(CalendarBucket::IsoWeek),
                ),
                RetentionTier::new(
                    "monthly",
                    Horizon::Ago(TimeDelta::days(28)),
                    Horizon::MonthsAgo(12),
                    KeepRule::PerBucket(CalendarBucket::Month),
                ),
                RetentionTier::new(
                    "yearly",
                    Horizon::MonthsAgo(12),
                    Horizon::Forever,
                    KeepRule::PerBucket(CalendarBucket::Year),
                ),
            ],
        }
    }
}

impl RetentionSchedule {
    /// Validate and build a schedule.
    ///
    /// The first tier must start at [`Horizon::Now`], the last must end at
    /// [`Horizon::Forever`], each tier must end where the next one starts,
    /// and every window must be non-empty.
    pub fn new(tiers: Vec<RetentionTier>) -> Result<Self, RetentionError> {
        let invalid = |msg: String| Err(RetentionError::InvalidSchedule(msg));
        let (Some(first), Some(last)) = (tiers.first(), tiers.last()) else {
            return invalid("at least one tier is required".into());
        };
        if first.newer != Horizon::Now {
            return invalid(format!("tier {} must start at now", first.name));
        }
        if last.older != Horizon::Forever {
            return invalid(format!("tier {} must extend forever", last.name));
        }
        for pair in tiers.windows(2) {
            if pair[0].older != pair[1].newer {
                return invalid(format!(
                    "tier {} ends at {} but tier {} starts at {}",
                    pair[0].name, pair[0].older, pair[1].name, pair[1].newer
                ));
            }
        }
        let now = Utc::now();
        for tier in &tiers {
            if let (Some(newer), Some(older)) = (tier.newer.instant(now), tier.older.instant(now))
                && older >= newer
            {
                return invalid(format!("tier {} has an empty window", tier.name));
            }
            if let KeepRule::Interval(interval) = tier.keep
                && interval <= TimeDelta::zero()
            {
                return invalid(format!("tier {} has a non-positive interval", tier.name));
            }
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[RetentionTier] {
        &self.tiers
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn default_schedule_is_valid() {
        let schedule = RetentionSchedule::default();
        assert_eq!(RetentionSchedule::new(schedule.tiers().to_vec()).unwrap(), schedule);
        assert_eq!(schedule.tiers().len(), 6);
    }

    #[test]
    fn windows_are_half_open_and_cover_everything() {
        let schedule = RetentionSchedule::default();
        let probes = [
            now() + TimeDelta::minutes(5),
            now(),
            now() - TimeDelta::hours(2),
            now() - TimeDelta::hours(2) + TimeDelta::seconds(1),
            now() - TimeDelta::days(1),
            now() - TimeDelta::days(7),
            now() - TimeDelta::days(28),
            Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap(),
        ];
        for at in probes {
            let hits = schedule
                .tiers()
                .iter()
                .filter(|t| t.contains(at, now()))
                .count();
            assert_eq!(hits, 1, "{at} should fall in exactly one tier");
        }
        // An artifact exactly on an edge belongs to the newer tier, whose
        // older edge is inclusive.
        assert!(schedule.tiers()[0].contains(now() - TimeDelta::hours(2), now()));
        let year_ago = Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap();
        assert!(schedule.tiers()[4].contains(year_ago, now()));
        assert!(!schedule.tiers()[5].contains(year_ago, now()));
    }

    #[test]
    fn rejects_gaps_and_open_ends() {
        let mut tiers = RetentionSchedule::default().tiers().to_vec();
        tiers[2].newer = Horizon::Ago(TimeDelta::hours(25));
        assert!(RetentionSchedule::new(tiers).is_err());

        let mut tiers = RetentionSchedule::default().tiers().to_vec();
        tiers.pop();
        assert!(RetentionSchedule::new(tiers).is_err());

        assert!(RetentionSchedule::new(Vec::new()).is_err());
    }

    #[test]
    fn rejects_inverted_windows() {
        let tiers = vec![
            RetentionTier::new(
                "a",
                Horizon::Now,
                Horizon::Ago(TimeDelta::hours(5)),
                KeepRule::Interval(TimeDelta::hours(1)),
            ),
            RetentionTier::new(
                "b",
                Horizon::Ago(TimeDelta::hours(5)),
                Horizon::Ago(TimeDelta::hours(1)),
                KeepRule::Interval(TimeDelta::hours(1)),
            ),
            RetentionTier::new(
                "c",
                Horizon::Ago(TimeDelta::hours(1)),
                Horizon::Forever,
                KeepRule::PerBucket(CalendarBucket::Year),
            ),
        ];
        assert!(RetentionSchedule::new(tiers).is_err());
    }

    #[test]
    fn iso_week_uses_week_year() {
        // 2024-12-30 is in ISO week 1 of 2025.
        let at = Utc.with_ymd_and_hms(2024, 12, 30, 12, 0, 0).unwrap();
        assert_eq!(CalendarBucket::IsoWeek.key(at, Tz::UTC), (2025, 1));
    }

    #[test]
    fn buckets_follow_the_configured_timezone() {
        // 23:30 UTC on Jan 1 is already Jan 2 in Paris.
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap();
        assert_eq!(CalendarBucket::Day.key(at, Tz::UTC), (2024, 1));
        assert_eq!(CalendarBucket::Day.key(at, Tz::Europe__Paris), (2024, 2));
    }

    #[test]
    fn horizon_display() {
        assert_eq!(Horizon::Ago(TimeDelta::hours(2)).to_string(), "2h");
        assert_eq!(Horizon::Ago(TimeDelta::days(7)).to_string(), "7d");
        assert_eq!(Horizon::MonthsAgo(12).to_string(), "12mo");
    }
}
