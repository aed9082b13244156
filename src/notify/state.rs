//! Per-race notification gating.
//!
//! A race may be alerted once per TTL. A rate-limited send puts the race
//! into a cooldown; other failures leave it untouched so the next cycle
//! simply retries. All timestamps are epoch seconds.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Stored bookkeeping for one race.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifiedState {
    #[serde(default)]
    pub last_sent_epoch: Option<i64>,
    #[serde(default)]
    pub cooldown_until_epoch: Option<i64>,
}

impl NotifiedState {
    /// Latest timestamp this entry cares about.
    fn last_activity(&self) -> Option<i64> {
        self.last_sent_epoch.max(self.cooldown_until_epoch)
    }
}

/// Effective state of a race at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceNotifyState {
    /// Never alerted, or the previous alert has expired.
    Unseen,
    /// Alerted at the given epoch; still inside the TTL.
    Notified(i64),
    /// Rate limited; blocked until the given epoch.
    CoolingDown(i64),
}

/// TTL/cooldown gate over all races of the day.
///
/// Read-modify-write without locking: one writer per race id is assumed.
#[derive(Debug, Clone)]
pub struct NotificationStateMachine {
    states: HashMap<String, NotifiedState>,
    ttl: Duration,
    cooldown: Duration,
}

impl NotificationStateMachine {
    pub fn new(ttl: Duration, cooldown: Duration) -> Self {
        Self {
            states: HashMap::new(),
            ttl,
            cooldown,
        }
    }

    /// Seed with previously persisted states.
    pub fn with_states(mut self, states: HashMap<String, NotifiedState>) -> Self {
        self.states = states;
        self
    }

    pub fn states(&self) -> &HashMap<String, NotifiedState> {
        &self.states
    }

    pub fn get(&self, race_id: &str) -> Option<&NotifiedState> {
        self.states.get(race_id)
    }

    /// Resolve the effective state at `now`. Cooldown takes precedence.
    pub fn state_at(&self, race_id: &str, now: DateTime<Utc>) -> RaceNotifyState {
        let Some(state) = self.states.get(race_id) else {
            return RaceNotifyState::Unseen;
        };
        let now = now.timestamp();

        if let Some(until) = state.cooldown_until_epoch {
            if now < until {
                return RaceNotifyState::CoolingDown(until);
            }
        }
        if let Some(sent) = state.last_sent_epoch {
            if now - sent < self.ttl.num_seconds() {
                return RaceNotifyState::Notified(sent);
            }
        }
        RaceNotifyState::Unseen
    }

    pub fn may_notify(&self, race_id: &str, now: DateTime<Utc>) -> bool {
        self.state_at(race_id, now) == RaceNotifyState::Unseen
    }

    /// Apply the outcome of a send and return the new state for persistence.
    pub fn record_attempt(
        &mut self,
        race_id: &str,
        now: DateTime<Utc>,
        success: bool,
        rate_limited: bool,
    ) -> NotifiedState {
        let entry = self.states.entry(race_id.to_string()).or_default();
        let epoch = now.timestamp();

        if success {
            entry.last_sent_epoch = Some(epoch);
            entry.cooldown_until_epoch = None;
        } else if rate_limited {
            entry.cooldown_until_epoch = Some(epoch + self.cooldown.num_seconds());
        }

        debug!(
            race_id,
            success,
            rate_limited,
            last_sent = ?entry.last_sent_epoch,
            cooldown_until = ?entry.cooldown_until_epoch,
            "Notification attempt recorded"
        );
        *entry
    }

    /// Drop entries with no activity at or after `cutoff`.
    ///
    /// Returns how many entries were removed.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let cutoff = cutoff.timestamp();
        let before = self.states.len();
        self.states
            .retain(|_, s| s.last_activity().map_or(false, |t| t >= cutoff));
        before - self.states.len()
    }
}

// ---------------------------------------------------------------------------
// Evaluation window
// ---------------------------------------------------------------------------

/// Slice of time around post time in which a race is evaluated.
///
/// `after` may be negative, closing the window before the off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationWindow {
    pub before: Duration,
    pub after: Duration,
}

impl EvaluationWindow {
    pub fn from_minutes(before: i64, after: i64) -> Self {
        Self {
            before: Duration::minutes(before),
            after: Duration::minutes(after),
        }
    }

    /// `post_time - before <= now <= post_time + after`
    pub fn contains(&self, post_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        post_time - self.before <= now && now <= post_time + self.after
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
