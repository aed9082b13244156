//! Race scanning: operating hours and race selection.
//!
//! Decides *when* the monitor is active and *which* of the day's races
//! are worth fetching odds for right now.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use tracing::debug;

use crate::notify::EvaluationWindow;
use crate::types::RaceCard;

// ---------------------------------------------------------------------------
// Operating hours
// ---------------------------------------------------------------------------

/// Local-time watch window `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingHours {
    pub start_hour: u32,
    pub end_hour: u32,
    pub offset: FixedOffset,
}

impl OperatingHours {
    pub fn new(start_hour: u32, end_hour: u32, offset: FixedOffset) -> Self {
        Self {
            start_hour,
            end_hour,
            offset,
        }
    }

    /// Racing day in the configured time zone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        now.with_timezone(&self.offset).hour()
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let hour = self.local_hour(now);
        hour >= self.start_hour && hour < self.end_hour
    }

    /// Past today's closing hour (summary time).
    pub fn is_after_close(&self, now: DateTime<Utc>) -> bool {
        self.local_hour(now) >= self.end_hour
    }
}

// ---------------------------------------------------------------------------
// Race selection
// ---------------------------------------------------------------------------

/// Why a race was not evaluated this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoPostTime,
    OutsideWindow,
}

/// Stable processing order: by race id.
pub fn order_races(mut races: Vec<RaceCard>) -> Vec<RaceCard> {
    races.sort_by(|a, b| a.race_id.cmp(&b.race_id));
    races.dedup_by(|a, b| a.race_id == b.race_id);
    races
}

/// Check a race's post time against the evaluation window.
pub fn check_window(
    window: &EvaluationWindow,
    race_id: &str,
    post_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, SkipReason> {
    let Some(post_time) = post_time else {
        debug!(race_id, "No post time, skipping");
        return Err(SkipReason::NoPostTime);
    };
    if !window.contains(post_time, now) {
        debug!(race_id, post_time = %post_time, "Outside evaluation window");
        return Err(SkipReason::OutsideWindow);
    }
    Ok(post_time)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
